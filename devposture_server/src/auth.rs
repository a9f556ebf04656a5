use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};

/// Authenticated caller identity. Identity-provider integration happens
/// upstream (reverse proxy / app gateway); this guard only trusts the
/// headers that layer stamps onto the request.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub email: String,
    pub name: String,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = ();

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let email = req
            .headers()
            .get_one("x-auth-email")
            .map(str::trim)
            .filter(|e| !e.is_empty());

        match email {
            Some(email) => {
                let name = req
                    .headers()
                    .get_one("x-auth-name")
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .unwrap_or(email);
                Outcome::Success(AuthUser {
                    email: email.to_string(),
                    name: name.to_string(),
                })
            }
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}
