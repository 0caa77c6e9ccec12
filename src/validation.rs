// ABOUTME: Field rules for account and secret requests, checked before anything is encrypted or stored
// ABOUTME: Each violated rule has its own ValidationError variant so callers can name it

use thiserror::Error;

use crate::types::{
    AddCardRequest, AddFileRequest, AddPasswordRequest, AddTextRequest, RegisterUserRequest,
};

pub const MAX_LABEL_CHARS: usize = 100;
pub const MAX_NOTE_CHARS: usize = 3000;
pub const MAX_LOGIN_CHARS: usize = 100;
pub const MAX_PASSWORD_CHARS: usize = 100;
pub const MAX_TEXT_CHARS: usize = 1000;
pub const MAX_CARD_OWNER_CHARS: usize = 100;
pub const MAX_FILE_NAME_CHARS: usize = 255;
pub const CARD_NUMBER_CHARS: usize = 16;
pub const EXPIRY_DATE_CHARS: usize = 7;
pub const CVV2_CHARS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("login must not be empty")]
    EmptyLogin,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("login must be at most {} characters", MAX_LOGIN_CHARS)]
    LoginTooLong,
    #[error("password must be at most {} characters", MAX_PASSWORD_CHARS)]
    PasswordTooLong,
    #[error("label must be at most {} characters", MAX_LABEL_CHARS)]
    LabelTooLong,
    #[error("note must be at most {} characters", MAX_NOTE_CHARS)]
    NoteTooLong,
    #[error("card number must be exactly {} characters", CARD_NUMBER_CHARS)]
    CardNumberLength,
    #[error("card owner must be at most {} characters", MAX_CARD_OWNER_CHARS)]
    CardOwnerTooLong,
    #[error("expiry date must be exactly {} characters", EXPIRY_DATE_CHARS)]
    ExpiryDateLength,
    #[error("cvv2 must be exactly {} characters", CVV2_CHARS)]
    Cvv2Length,
    #[error("text must be at most {} characters", MAX_TEXT_CHARS)]
    TextTooLong,
    #[error("file name must not be empty")]
    EmptyFileName,
    #[error("file name must be at most {} characters", MAX_FILE_NAME_CHARS)]
    FileNameTooLong,
    #[error("file name must not contain path separators or control characters")]
    FileNameInvalid,
}

pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError>;
}

fn chars(value: &str) -> usize {
    value.chars().count()
}

fn check_max(value: &str, max: usize, err: ValidationError) -> Result<(), ValidationError> {
    if chars(value) > max {
        return Err(err);
    }
    Ok(())
}

fn check_exact(value: &str, len: usize, err: ValidationError) -> Result<(), ValidationError> {
    if chars(value) != len {
        return Err(err);
    }
    Ok(())
}

fn validate_meta(label: &str, note: &str) -> Result<(), ValidationError> {
    check_max(label, MAX_LABEL_CHARS, ValidationError::LabelTooLong)?;
    check_max(note, MAX_NOTE_CHARS, ValidationError::NoteTooLong)
}

/// File names address blobs directly, so anything that could escape the
/// owner's namespace is refused.
pub fn validate_file_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyFileName);
    }
    check_max(name, MAX_FILE_NAME_CHARS, ValidationError::FileNameTooLong)?;

    if name == "."
        || name == ".."
        || name
            .chars()
            .any(|ch| ch == '/' || ch == '\\' || ch.is_control())
    {
        return Err(ValidationError::FileNameInvalid);
    }
    Ok(())
}

impl Validate for RegisterUserRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        if self.login.is_empty() {
            return Err(ValidationError::EmptyLogin);
        }
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        check_max(&self.login, MAX_LOGIN_CHARS, ValidationError::LoginTooLong)?;
        check_max(&self.password, MAX_PASSWORD_CHARS, ValidationError::PasswordTooLong)
    }
}

impl Validate for AddPasswordRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_max(&self.login, MAX_LOGIN_CHARS, ValidationError::LoginTooLong)?;
        check_max(&self.password, MAX_PASSWORD_CHARS, ValidationError::PasswordTooLong)?;
        validate_meta(&self.label, &self.note)
    }
}

impl Validate for AddCardRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_exact(&self.number, CARD_NUMBER_CHARS, ValidationError::CardNumberLength)?;
        check_max(&self.owner, MAX_CARD_OWNER_CHARS, ValidationError::CardOwnerTooLong)?;
        check_exact(&self.expiry_date, EXPIRY_DATE_CHARS, ValidationError::ExpiryDateLength)?;
        check_exact(&self.cvv2, CVV2_CHARS, ValidationError::Cvv2Length)?;
        validate_meta(&self.label, &self.note)
    }
}

impl Validate for AddTextRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        check_max(&self.data, MAX_TEXT_CHARS, ValidationError::TextTooLong)?;
        validate_meta(&self.label, &self.note)
    }
}

impl Validate for AddFileRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validate_file_name(&self.file_name)?;
        validate_meta(&self.label, &self.note)
    }
}
