// Copyright 2017-2024 Peter Williams and collaborators
// Licensed under the MIT License.

//! Summarize, and optionally convert, the CalAtmosphere table of an ASDM
//! dataset.

use anyhow::{Context, Error};
use clap::{Arg, ArgAction, Command};
use rubbl_asdm::{AsdmRow, CalAtmosphereTable, Container};
use rubbl_core::io::ByteOrder;
use rubbl_core::notify::ClapNotificationArgsExt;
use rubbl_core::{rn_note, rn_warning};
use std::path::PathBuf;
use std::process;
use std::rc::Rc;

fn main() {
    let matches = Command::new("calatm")
        .version("0.1.0")
        .rubbl_notify_args()
        .arg(
            Arg::new("declared_size")
                .long("rows")
                .value_name("N")
                .help("The number of rows that the dataset manifest declares")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .value_name("DIR")
                .help("Write the table to this directory")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("binary")
                .long("binary")
                .help("Write the output in binary (MIME) form")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("byte_order")
                .long("byte-order")
                .value_name("ORDER")
                .help("The byte order of binary output")
                .value_parser(["Little_Endian", "Big_Endian"]),
        )
        .arg(
            Arg::new("IN-DIR")
                .help("The path of the input dataset")
                .required(true)
                .index(1)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    process::exit(rubbl_core::notify::run_with_notifications(
        matches,
        |matches, nbe| -> Result<i32, Error> {
            let Some(indir) = matches.get_one::<PathBuf>("IN-DIR") else {
                return Ok(1);
            };

            let mut container = Container::default();
            container.set_directory(indir);
            let mut table = CalAtmosphereTable::new(Rc::new(container));

            match matches.get_one::<usize>("declared_size") {
                Some(n) => table.set_not_present_in_memory(*n),
                None => {
                    table
                        .set_from_file(indir, nbe)
                        .with_context(|| format!("failed to load \"{}\"", indir.display()))?;
                }
            }

            let n_rows = table
                .get(nbe)
                .with_context(|| format!("failed to load \"{}\"", indir.display()))?
                .len();

            println!("Table \"{}\" in \"{}\":", table.name(), indir.display());
            println!("Entity: {}", table.entity().entity_id.as_str());
            println!("Schema version: {}", table.version().unwrap_or("unknown"));
            println!(
                "Stored as: {}",
                if table.is_file_as_bin() { "binary" } else { "XML" }
            );
            println!("Number of rows: {}", n_rows);
            println!();

            let key_names = table.key_names();
            println!("{}", key_names.join("  "));

            for row in table.rows() {
                println!(
                    "{}  {}  {}  {}  {}  (numReceptor={}, numFreq={})",
                    row.antenna_name,
                    row.receiver_band,
                    row.baseband_name,
                    row.cal_data_id,
                    row.cal_reduction_id,
                    row.num_receptor,
                    row.num_freq
                );

                if row.has_attribute("sbGain") {
                    rn_note!(nbe, "row for {} has sideband gains", row.antenna_name);
                }
            }

            if let Some(outdir) = matches.get_one::<PathBuf>("output") {
                table.set_file_as_bin(matches.get_flag("binary"));

                if let Some(order) = matches.get_one::<String>("byte_order") {
                    if !table.is_file_as_bin() {
                        rn_warning!(nbe, "--byte-order has no effect on XML output");
                    }

                    table.set_byte_order(order.parse::<ByteOrder>()?);
                }

                table
                    .to_file(outdir)
                    .with_context(|| format!("failed to write \"{}\"", outdir.display()))?;
                rn_note!(nbe, "wrote {} rows to \"{}\"", n_rows, outdir.display());
            }

            Ok(0)
        },
    ));
}
