mod channels;
mod items;
mod pages;
mod schema;
mod types;

pub use schema::Database;
pub use types::{
    Authors, Channel, DatabaseError, DecodeError, DublinCore, Enclosure, Enclosures, Item,
    JsonColumn, Page, Person, PostQuery, PostSummary, Status, StringList,
};
