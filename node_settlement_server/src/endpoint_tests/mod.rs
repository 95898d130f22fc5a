mod helpers;

mod codes;
mod quotes;
mod settlements;
mod trials;
