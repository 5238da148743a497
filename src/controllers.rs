//! Demo site: public pages, sign-in with CSRF and flash messages, an admin
//! area behind a controller guard and a small event stream.

use std::time::Duration;

use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use keel::context::RequestContext;
use keel::controller::{ActionResult, Controller, Handler};
use keel::html::escape_html;
use keel::http::request::Method;
use keel::http::response::{Response, StatusCode};
use keel::validate::{Rule, Rules};
use keel::{App, Flow, HttpError};

pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub role: String,
}

pub fn routes(app: &mut App) -> keel::Result<()> {
    app.route(Method::GET, "/", Handler::action("home", Pages::home), Some("home"))?
        .route(Method::GET, "/contact", Handler::action("contact", Pages::contact), Some("contact"))?
        .route(Method::GET, "/login", Handler::action("login_form", Auth::login_form), Some("login"))?
        .route(Method::POST, "/login", Handler::action("login", Auth::login), None)?
        .route(Method::POST, "/logout", Handler::action("logout", Auth::logout), Some("logout"))?
        .route(Method::GET, "/admin", Handler::action("dashboard", Admin::dashboard), Some("admin"))?
        .route(Method::GET, "/api/me", Handler::action("me", Api::me), Some("api.me"))?
        .route(Method::GET, "/events/clock", Handler::action("clock", Events::clock), Some("events.clock"))?;
    Ok(())
}

fn render(ctx: &mut RequestContext<'_>, title: &str, content: &str) -> ActionResult {
    let user: Option<User> = ctx.current_user();
    let csrf_input = ctx.csrf().hidden_input(None);

    let flashes: String = ctx
        .flash()
        .get()
        .iter()
        .map(|m| {
            format!(
                r#"<div class="flash flash-{}">{}</div>"#,
                escape_html(&m.kind),
                escape_html(&m.text)
            )
        })
        .collect();

    let account = match &user {
        Some(user) => format!(
            r#"{} | <form method="post" action="/logout" class="inline">{}<button type="submit">Sign out</button></form>"#,
            escape_html(&user.name),
            csrf_input
        ),
        None => r#"<a href="/login">Sign in</a>"#.to_string(),
    };
    let admin_link = match &user {
        Some(user) if user.role == ROLE_ADMIN => r#"<a href="/admin">Admin</a>"#,
        _ => "",
    };

    Ok(Response::html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>{title}</title></head>
<body>
<nav><a href="/">Home</a> <a href="/contact">Contact</a> {admin_link} <span class="right">{account}</span></nav>
{flashes}
{content}
</body>
</html>
"#,
        title = escape_html(title),
    )))
}

#[derive(Default)]
pub struct Pages;

impl Controller for Pages {}

impl Pages {
    fn home(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        render(
            ctx,
            "Keel",
            r#"<h1>Keel</h1>
<ul>
<li><a href="/contact">Contact</a>: static page inside the layout</li>
<li><a href="/login">Sign in</a>: form with CSRF token, flash messages and redirect</li>
<li><a href="/admin">Admin</a>: page behind a controller guard</li>
</ul>"#,
        )
    }

    fn contact(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        render(ctx, "Contact", "<h2>Contact</h2><p>Write to us at hello@example.com.</p>")
    }
}

#[derive(Default)]
pub struct Auth;

impl Controller for Auth {}

impl Auth {
    fn login_form(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        if ctx.current_user::<User>().is_some() {
            return ctx.redirect_to_route("home", &[]);
        }
        let csrf_input = ctx.csrf().hidden_input(None);
        render(
            ctx,
            "Sign in",
            &format!(
                r#"<h2>Sign in</h2>
<form method="post" action="/login">
{csrf_input}
<label for="username">Username</label> <input type="text" id="username" name="username" required>
<label for="password">Password</label> <input type="password" id="password" name="password" required>
<button type="submit">Sign in</button>
</form>"#
            ),
        )
    }

    fn login(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        ctx.validate_csrf()?;

        let rules = Rules::new()
            .field("username", [Rule::Required, Rule::Length { min: 1, max: 64 }])
            .field("password", [Rule::Required]);
        if let Err(errors) = rules.validate_form(ctx.request()) {
            let messages: Vec<String> = errors.iter().map(|(f, m)| format!("{f}: {m}")).collect();
            let mut flash = ctx.flash();
            for message in &messages {
                flash.error(message);
            }
            return ctx.redirect_to_route("login", &[]);
        }

        let username = ctx.request().form_or("username", "").trim().to_string();
        let password = ctx.request().form_or("password", "").to_string();

        let app = &ctx.config().app;
        let digest = hex::encode(Sha256::digest(password.as_bytes()));
        let valid = !app.admin_user.is_empty()
            && username == app.admin_user
            && constant_time_eq(digest.as_bytes(), app.admin_password_sha256.as_bytes());

        if !valid {
            tracing::info!(user = %username, ip = ?ctx.request().client_addr(), "Login failed");
            ctx.flash().error("Wrong username or password.");
            return ctx.redirect_to_route("login", &[]);
        }

        ctx.sign_in(&User {
            id: 1,
            name: username.clone(),
            role: ROLE_ADMIN.to_string(),
        })?;
        ctx.flash().success("Signed in.");
        tracing::info!(user = %username, "Login OK");
        ctx.redirect_to_route("admin", &[])
    }

    fn logout(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        ctx.validate_csrf()?;
        ctx.sign_out();
        ctx.flash().info("Signed out.");
        ctx.redirect_to_route("home", &[])
    }
}

#[derive(Default)]
pub struct Admin {
    user: Option<User>,
}

impl Controller for Admin {
    fn before_route(&mut self, ctx: &mut RequestContext<'_>) -> Result<Flow, HttpError> {
        let Some(user) = ctx.current_user::<User>() else {
            ctx.flash().warning("Please sign in first.");
            return Ok(Flow::ShortCircuit(ctx.redirect_to_route("login", &[])?));
        };
        if user.role != ROLE_ADMIN {
            ctx.flash().error("Access denied.");
            return Ok(Flow::ShortCircuit(ctx.redirect_to_route("home", &[])?));
        }
        self.user = Some(user);
        Ok(Flow::Continue)
    }
}

impl Admin {
    fn dashboard(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        let user = self.user.as_ref().ok_or(HttpError::Unauthorized)?;
        let content = format!(
            "<h2>Admin dashboard</h2><p>Signed in as <strong>{}</strong> (role: {}).</p>",
            escape_html(&user.name),
            escape_html(&user.role)
        );
        render(ctx, "Admin dashboard", &content)
    }
}

#[derive(Default)]
pub struct Api;

impl Controller for Api {
    fn before_route(&mut self, ctx: &mut RequestContext<'_>) -> Result<Flow, HttpError> {
        ctx.require_auth()?;
        Ok(Flow::Continue)
    }
}

impl Api {
    fn me(&mut self, ctx: &mut RequestContext<'_>) -> ActionResult {
        let user: User = ctx.current_user().ok_or(HttpError::Unauthorized)?;
        Ok(Response::json(&user, StatusCode::Ok)?)
    }
}

#[derive(Default)]
pub struct Events;

impl Controller for Events {}

impl Events {
    fn clock(&mut self, _ctx: &mut RequestContext<'_>) -> ActionResult {
        Ok(Response::sse(|sink| {
            for tick in 1..=5 {
                sink.event("tick", &tick.to_string())?;
                std::thread::sleep(Duration::from_secs(1));
            }
            sink.event("done", "bye")
        }))
    }
}
