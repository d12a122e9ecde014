mod model;

pub use model::{Client, Invoice, LineItem, Product};
