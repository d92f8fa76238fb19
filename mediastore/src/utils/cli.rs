use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Listening host
    #[arg(long, env = "MEDIASTORE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Listening port
    #[arg(short, long, env = "MEDIASTORE_PORT", default_value_t = 8970)]
    pub port: u16,

    /// Chunk storage backend: FILESYSTEM, DATABASE or MEMORY
    #[arg(short, long, env = "MEDIASTORE_STORAGE", default_value = "FILESYSTEM")]
    pub storage: String,

    /// Root directory of the FILESYSTEM backend
    #[arg(long, env = "MEDIASTORE_ROOTDIR", default_value = "/var/lib/mediastore")]
    pub root: String,

    /// Catalog database url
    #[arg(
        long,
        env = "DATABASE_URL",
        default_value = "sqlite:///var/lib/mediastore/catalog.db"
    )]
    pub database_url: String,

    /// Size in bytes of every chunk but the last
    #[arg(
        long,
        env = "MEDIASTORE_CHUNK_SIZE",
        default_value_t = crate::config::DEFAULT_CHUNK_SIZE
    )]
    pub chunk_size: u32,

    /// Chunk writes kept in flight per upload
    #[arg(
        long,
        env = "MEDIASTORE_UPLOAD_CONCURRENCY",
        default_value_t = crate::config::DEFAULT_UPLOAD_CONCURRENCY
    )]
    pub upload_concurrency: usize,

    /// Largest accepted audio file in bytes
    #[arg(
        long,
        env = "MEDIASTORE_MAX_AUDIO_SIZE",
        default_value_t = crate::config::DEFAULT_MAX_AUDIO_SIZE
    )]
    pub max_audio_size: u64,

    /// Largest accepted cover image in bytes
    #[arg(
        long,
        env = "MEDIASTORE_MAX_IMAGE_SIZE",
        default_value_t = crate::config::DEFAULT_MAX_IMAGE_SIZE
    )]
    pub max_image_size: u64,
}
