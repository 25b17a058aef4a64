pub mod core {
    pub mod config;
    pub mod error;
    pub mod hardware;
    pub mod instance;
    pub mod operator;
    pub mod platform;
    pub mod runner;
    pub mod test;
}


pub mod tests;


pub mod reporters;
pub mod report;
pub mod menu;
