use uuid::Uuid;

pub type UserRef = Uuid;
