use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArborError {
    #[error("storage error: {message}")]
    Storage { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("already exists: {message}")]
    AlreadyExists { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
}

impl ArborError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::AlreadyExists {
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}

pub type ArborResult<T> = Result<T, ArborError>;

impl From<sea_orm::DbErr> for ArborError {
    fn from(value: sea_orm::DbErr) -> Self {
        ArborError::storage(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::ArborError;

    #[test]
    fn helper_constructors_set_variants() {
        let err = ArborError::storage("disk");
        assert!(matches!(err, ArborError::Storage { .. }));
        let err = ArborError::not_found("missing");
        assert!(err.is_not_found());
        let err = ArborError::already_exists("dup");
        assert!(err.is_already_exists());
        let err = ArborError::invalid("bad");
        assert!(matches!(err, ArborError::Validation { .. }));
    }

    #[test]
    fn messages_carry_context() {
        let err = ArborError::already_exists("project named \"Home\"");
        assert!(err.to_string().contains("Home"));
    }
}
