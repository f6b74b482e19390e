//! Registration deep links

use reqwest::Url;
use shared::models::UserRole;

/// Token carried by a registration link
#[derive(Debug, Clone, Copy)]
pub enum LinkToken<'a> {
    /// Who referred the recipient (an order id or the sender's public id)
    Referral(&'a str),
    /// One-time invitation token issued by an admin
    Invite(&'a str),
}

/// `{site}/register?role=..&ref=..|invite=..&email=..`
pub fn registration_link(site: &Url, role: UserRole, token: LinkToken<'_>, email: &str) -> String {
    let mut url = site.clone();
    url.set_path("/register");
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.append_pair("role", role.as_str());
        match token {
            LinkToken::Referral(r) => query.append_pair("ref", r),
            LinkToken::Invite(t) => query.append_pair("invite", t),
        };
        if !email.is_empty() {
            query.append_pair("email", email);
        }
    }
    url.to_string()
}

pub fn dashboard_link(site: &Url) -> String {
    let mut url = site.clone();
    url.set_path("/dashboard");
    url.set_query(None);
    url.to_string()
}
