mod import;
mod rates;
