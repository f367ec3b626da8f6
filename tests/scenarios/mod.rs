mod range_checks;
mod streaming;
