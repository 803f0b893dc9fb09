mod common;

mod duplicates;
mod intake;
