pub mod fingerprint;
pub mod publish;
