/// Raw image bytes handed to the pipeline by a camera or gallery producer.
/// Encoded to base64 only at the wire boundary.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub mime_type: String,
    pub data: Vec<u8>,
}
