/// Runtime knobs for the encode and decode pipelines.
#[derive(Debug, Clone)]
pub struct Config {
    /// Strategy used when the caller names none.
    pub default_strategy: String,
    /// Format used when neither a name nor a known output extension is given.
    pub default_format: String,
    /// Number of payload entries shown by the payload preview.
    pub preview_limit: usize,
    /// Largest file decode will reconstruct, in bytes.
    pub max_output_bytes: u64,
    /// Read buffer for bit extraction.
    pub read_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_strategy: "rle".to_string(),
            default_format: "json".to_string(),
            preview_limit: 15,
            max_output_bytes: 4 << 30,
            read_buffer_size: crate::bits::DEFAULT_BUFFER_SIZE,
        }
    }
}
