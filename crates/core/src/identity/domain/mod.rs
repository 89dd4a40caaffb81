pub mod embedding;
pub mod embedding_provider;
pub mod identity_verifier;
