#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingReference {
    pub mpxn: String,
    pub reference: String,
    pub deleted: bool,
}

impl BookingReference {
    pub fn is_usable(&self) -> bool {
        !self.deleted && !self.reference.trim().is_empty()
    }
}
