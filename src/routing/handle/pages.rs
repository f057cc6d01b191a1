//! placeholder pages. the interesting part happens in the gate before these
//! are reached

use axum::extract::Path;
use axum::http::StatusCode;
use mfgsite_lib::ids;

type Page = (StatusCode, &'static str);

pub async fn home() -> Page {
    (StatusCode::OK, "home")
}

pub async fn dashboard() -> Page {
    (StatusCode::OK, "dashboard")
}

pub async fn projects() -> Page {
    (StatusCode::OK, "projects")
}

pub async fn project(Path(project_id): Path<ids::ProjectId>) -> (StatusCode, String) {
    (StatusCode::OK, format!("project {project_id}"))
}

pub async fn gantt() -> Page {
    (StatusCode::OK, "gantt")
}

pub async fn calendar() -> Page {
    (StatusCode::OK, "calendar")
}

pub async fn notifications() -> Page {
    (StatusCode::OK, "notifications")
}

pub async fn admin() -> Page {
    (StatusCode::OK, "admin")
}

pub async fn admin_users() -> Page {
    (StatusCode::OK, "admin users")
}

pub async fn admin_reports() -> Page {
    (StatusCode::OK, "admin reports")
}

pub async fn login() -> Page {
    (StatusCode::OK, "login")
}

pub async fn signup() -> Page {
    (StatusCode::OK, "signup")
}

pub async fn reset_password() -> Page {
    (StatusCode::OK, "reset password")
}

pub async fn reset_password_confirm() -> Page {
    (StatusCode::OK, "reset password confirm")
}
