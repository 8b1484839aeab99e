use clap::Parser;

pub fn parse_args() -> Args {
    Args::parse()
}

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
pub struct Args {
    #[arg(
        short,
        long,
        help = "Specify a port to serve the API on. If not specified, a random unused port is chosen."
    )]
    pub port: Option<u32>,
}
