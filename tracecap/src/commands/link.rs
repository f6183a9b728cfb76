use clap::Args;
use libtracecap_live::link_info;
use libtracecap_tools::Error;

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Interface name
    interface: String,
}

pub fn run(args: LinkArgs) -> Result<(), Error> {
    let info = link_info(&args.interface)?;
    println!("Interface: {}", args.interface);
    println!("MTU: {}", info.mtu);
    match info.speed_mbps {
        Some(s) => println!("Speed: {} Mb/s", s),
        None => println!("Speed: unknown"),
    }
    println!("Connected: {}", if info.connected { "yes" } else { "no" });
    Ok(())
}
