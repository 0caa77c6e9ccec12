// ABOUTME: SeaORM entities for account records and owner-scoped encrypted secret records
// ABOUTME: Exports the user and secret tables plus the secret kind discriminator

pub mod secret;
pub mod user;

pub use secret::SecretKind;
