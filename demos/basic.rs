//! Minimal waymark example: exact routes, middleware, and request context.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl -i 'http://localhost:3000/hello?name=alice'
//!   curl -i -X POST http://localhost:3000/login -d 'username=john_doe'
//!   curl -i http://localhost:3000/users
//!   curl -i http://localhost:3000/nope

use waymark::{Method, Request, ResponseWriter, Router, Server, StatusCode, middleware};

#[tokio::main]
async fn main() -> Result<(), waymark::Error> {
    tracing_subscriber::fmt::init();

    let app = Router::new()
        .middleware(middleware::trace)
        .middleware(middleware::correlation_header)
        .get("/hello", hello)
        .post("/login", login)
        .get("/users", list_users)
        .set_response(Method::GET, "/users", audit)
        .not_found(not_found);

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /hello?name=alice
async fn hello(w: ResponseWriter, req: Request) {
    let name = req.query_params().and_then(|q| q.get("name")).unwrap_or("world");
    w.text(StatusCode::OK, format!("hello, {name}\n"));
}

// POST /login   (application/x-www-form-urlencoded)
//
// Form values are decoded on demand; a malformed body is the handler's
// problem to report.
async fn login(w: ResponseWriter, req: Request) {
    match req.form_params() {
        Ok(form) => match form.get("username") {
            Some(user) => w.text(StatusCode::OK, format!("welcome, {user}\n")),
            None => w.text(StatusCode::UNPROCESSABLE_ENTITY, "username required\n"),
        },
        Err(e) => w.text(StatusCode::BAD_REQUEST, format!("{e}\n")),
    }
}

// GET /users
//
// waymark sends bytes; serialise however you like.
async fn list_users(w: ResponseWriter, _req: Request) {
    w.json(StatusCode::OK, br#"[{"id":1,"name":"alice"}]"#);
}

// Runs after list_users, outside the middleware chain.
async fn audit(_w: ResponseWriter, req: Request) {
    tracing::info!(correlation_id = req.correlation_id(), "users listed");
}

async fn not_found(w: ResponseWriter, req: Request) {
    w.text(StatusCode::NOT_FOUND, format!("no route for {} {}\n", req.method(), req.path()));
}
