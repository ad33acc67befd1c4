pub mod client;
pub mod models;

pub use client::{BoardClient, CardFilter};
pub use models::{Board, Card, Column, Identity, IdentityAccount, RemoteUser};
