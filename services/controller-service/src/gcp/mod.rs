pub mod ads;
pub mod bigquery;
pub mod firestore;
pub mod tasks;
