//! Server-rendered pages.
//!
//! Row editing is done htmx-style: the edit button swaps a row for an
//! inline form, and saving PUTs the form and swaps the re-rendered row
//! back in.

use maud::{html, Markup, DOCTYPE};

use crate::db::Person;
use crate::session::UserProfile;

fn layout(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html {
            head {
                title { (title) }
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                script src="https://unpkg.com/htmx.org@1.9.12" {}
            }
            body {
                (content)
            }
        }
    }
}

pub fn index(profile: Option<&UserProfile>) -> Markup {
    layout(
        "rolo",
        html! {
            h1 { "rolo" }
            @match profile {
                Some(profile) => {
                    p { "Signed in as " (profile.name) " (" (profile.email) ")" }
                    p {
                        a href="/contact" { "Contacts" }
                        " · "
                        a href="/logout" { "Log out" }
                    }
                }
                None => {
                    p { a href="/login" { "Log in" } }
                }
            }
        },
    )
}

pub fn contacts(people: &[Person]) -> Markup {
    layout(
        "Contacts",
        html! {
            h1 { "Contacts" }
            table {
                thead {
                    tr { th { "Name" } th { "Email" } th {} }
                }
                tbody {
                    @for person in people {
                        (row(person))
                    }
                }
            }
            p { a href="/" { "Home" } }
        },
    )
}

pub fn row(person: &Person) -> Markup {
    html! {
        tr id={ "contact-" (person.id) } {
            td { (person.name) }
            td { (person.email) }
            td {
                button hx-get={ "/contact/" (person.id) "/edit" }
                    hx-target={ "#contact-" (person.id) }
                    hx-swap="outerHTML" { "Edit" }
            }
        }
    }
}

pub fn edit_row(person: &Person) -> Markup {
    html! {
        tr id={ "contact-" (person.id) } {
            td { input type="text" name="name" value=(person.name) form={ "edit-" (person.id) }; }
            td { input type="email" name="email" value=(person.email) form={ "edit-" (person.id) }; }
            td {
                form id={ "edit-" (person.id) }
                    hx-put={ "/contact/" (person.id) }
                    hx-target={ "#contact-" (person.id) }
                    hx-swap="outerHTML" {
                    button type="submit" { "Save" }
                    button type="button"
                        hx-get={ "/contact/" (person.id) }
                        hx-target={ "#contact-" (person.id) }
                        hx-swap="outerHTML" { "Cancel" }
                }
            }
        }
    }
}
