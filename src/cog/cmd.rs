/// Byte sequences sent to the COG driver during bring-up
pub struct Cmd;
impl Cmd {
    /// Read COG ID, followed by one dummy byte to clock the answer out
    pub const READ_COG_ID: [u8; 2] = [0x71, 0x00];

    /// Two zero bytes written right after the bus opens. The driver does not
    /// answer the ID read without them.
    pub const PRIMER: [u8; 2] = [0x00, 0x00];
}
