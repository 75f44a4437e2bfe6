use chrono::Weekday;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn password(&self) -> String;
    fn port(&self) -> String;
    fn database_url(&self) -> Option<String>;
    /// First day of a week for the "this week" booking view.
    fn week_start(&self) -> Weekday;
}
