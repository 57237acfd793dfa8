use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use rtp_packer::media::h264::{DEFAULT_MAX_PAYLOAD, DEFAULT_SSRC};
use rtp_packer::media::nal::split_access_units;
use rtp_packer::media::sdp::{ParameterSets, generate_sdp};
use rtp_packer::transport::{FileSink, TcpSender, UdpSender};
use rtp_packer::{PackerConfig, PacketSink, Streamer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "rtp-send",
    about = "Stream an H.264 Annex B file as RTP (RFC 6184)"
)]
struct Args {
    /// H.264 Annex B elementary stream
    #[arg(long, short)]
    input: PathBuf,

    /// Receiver address (host:port)
    #[arg(long, short, required_unless_present = "output", conflicts_with = "output")]
    dest: Option<SocketAddr>,

    /// Send over TCP instead of UDP
    #[arg(long, requires = "dest")]
    tcp: bool,

    /// Dump packets to a file instead of sending them
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Pictures per second; 0 sends as fast as possible
    #[arg(long, short, default_value_t = 15)]
    fps: u32,

    /// Maximum RTP payload length in bytes
    #[arg(long, default_value_t = DEFAULT_MAX_PAYLOAD)]
    max_payload: usize,

    /// RTP synchronization source identifier
    #[arg(long, default_value_t = DEFAULT_SSRC, conflicts_with = "random_ssrc")]
    ssrc: u32,

    /// Pick a random SSRC
    #[arg(long)]
    random_ssrc: bool,

    /// Write an SDP description for receivers to this path
    #[arg(long, requires = "dest")]
    sdp: Option<PathBuf>,

    /// Restart from the beginning of the file at end of stream
    #[arg(long = "loop")]
    repeat: bool,

    /// Verbose logging (overridden by RUST_LOG)
    #[arg(long)]
    debug: bool,
}

fn open_sink(args: &Args) -> rtp_packer::Result<Box<dyn PacketSink>> {
    match (args.dest, &args.output) {
        (Some(dest), _) if args.tcp => Ok(Box::new(TcpSender::connect(dest)?)),
        (Some(dest), _) => Ok(Box::new(UdpSender::connect(dest)?)),
        (None, Some(path)) => Ok(Box::new(FileSink::create(path)?)),
        (None, None) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "one of --dest or --output is required",
        )
        .into()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let data = match std::fs::read(&args.input) {
        Ok(data) => data,
        Err(e) => {
            tracing::error!(input = %args.input.display(), error = %e, "cannot read input");
            return ExitCode::FAILURE;
        }
    };

    let frames = match split_access_units(&data) {
        Ok(frames) => frames,
        Err(e) => {
            tracing::error!(input = %args.input.display(), error = %e, "not an Annex B stream");
            return ExitCode::FAILURE;
        }
    };
    tracing::info!(frames = frames.len(), bytes = data.len(), "input loaded");

    let base = if args.random_ssrc {
        PackerConfig::with_random_ssrc()
    } else {
        PackerConfig {
            ssrc: args.ssrc,
            ..PackerConfig::default()
        }
    };
    let config = PackerConfig {
        max_payload: args.max_payload,
        ..base
    };

    if let (Some(path), Some(dest)) = (&args.sdp, args.dest) {
        let mut params = ParameterSets::new();
        params.capture(&data);
        let sdp = generate_sdp(dest, config.payload_type, &params, "rtp-send");
        if let Err(e) = std::fs::write(path, sdp) {
            tracing::error!(path = %path.display(), error = %e, "cannot write SDP");
            return ExitCode::FAILURE;
        }
        tracing::info!(path = %path.display(), "SDP written");
    }

    let sink = match open_sink(&args) {
        Ok(sink) => sink,
        Err(e) => {
            tracing::error!(error = %e, "cannot open output");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        ssrc = format_args!("{:#010X}", config.ssrc),
        max_payload = config.max_payload,
        fps = args.fps,
        "streaming"
    );

    let mut streamer = Streamer::new(config, sink);
    let interval = (args.fps > 0).then(|| Duration::from_secs(1) / args.fps);
    let mut next_deadline = Instant::now();

    loop {
        for frame in &frames {
            if let Some(interval) = interval {
                let now = Instant::now();
                if next_deadline > now {
                    thread::sleep(next_deadline - now);
                }
                next_deadline += interval;
            }

            if let Err(e) = streamer.send_frame(frame) {
                tracing::warn!(error = %e, frame_bytes = frame.len(), "frame dropped");
            }
        }
        if !args.repeat {
            break;
        }
        tracing::debug!(frames = streamer.frames(), "end of input, looping");
    }

    if let Err(e) = streamer.finish() {
        tracing::error!(error = %e, "flush failed");
        return ExitCode::FAILURE;
    }

    let totals = streamer.totals();
    tracing::info!(
        frames = streamer.frames(),
        packets = totals.packets,
        bytes = totals.bytes,
        "done"
    );
    ExitCode::SUCCESS
}
