use argh::FromArgs;

/// Dev node for the gridchain block flow.
#[derive(FromArgs)]
pub struct Args {
    /// group count G
    #[argh(option, default = "2")]
    pub groups: u8,

    /// first group this broker owns
    #[argh(option, default = "0")]
    pub broker_from: u8,

    /// one past the last group this broker owns
    #[argh(option, default = "2")]
    pub broker_until: u8,

    /// group this node mines for
    #[argh(option, default = "0")]
    pub main_group: u8,

    /// start the miner
    #[argh(switch)]
    pub mine: bool,
}
