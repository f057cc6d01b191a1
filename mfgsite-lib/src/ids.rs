pub type UserId = i64;
pub type ProjectId = i64;
