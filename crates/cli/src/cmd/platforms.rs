use anyhow::Result;

use autobuild_lib::platform::{Platform, supported_platforms};

use crate::output::{OutputFormat, print_json, print_stat};

pub fn cmd_platforms(output: OutputFormat) -> Result<()> {
  let platforms = supported_platforms();

  if output.is_json() {
    return print_json(&platforms);
  }

  let host = Platform::current();
  for platform in &platforms {
    let marker = if Some(*platform) == host { " (host)" } else { "" };
    println!("{}{}", platform, marker);
  }
  if host.is_none() {
    print_stat("Host", "not a supported platform");
  }
  Ok(())
}
