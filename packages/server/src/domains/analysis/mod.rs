// Analysis domain - submit a site, scrape it, summarize it, store the result

pub mod activities;
pub mod models;
pub mod workflows;
