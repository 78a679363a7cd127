pub mod chat;
pub mod search;
pub mod status;

#[cfg(test)]
pub(crate) mod testing;
