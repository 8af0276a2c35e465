use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;

use source_formats::bsp::{BspBuilder, LumpId, ProducerVariant, SlotState};
use source_formats::{MdlFile, VhvFile};

#[derive(Parser)]
#[command(name = "bsp-info")]
#[command(about = "Inspect Source engine maps, VHV lighting and MDL headers")]
struct Cli {
    /// Producer of the file: standard, l4d2 or ps3
    #[arg(long, global = true, default_value = "standard")]
    variant: ProducerVariant,
    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// File header and map checksum
    Header { path: PathBuf },
    /// Lump directory, decoding every present lump
    Lumps { path: PathBuf },
    /// Entity key/values
    Entities {
        path: PathBuf,
        #[arg(long)]
        classname: Option<String>,
    },
    /// Static props from the game lump
    Props { path: PathBuf },
    /// Static prop vertex lighting file
    Vhv { path: PathBuf },
    /// Studio model header and bones
    Mdl { path: PathBuf },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let result = match cli.command {
        Commands::Header { path } => header(&path, cli.variant, json),
        Commands::Lumps { path } => lumps(&path, cli.variant, json),
        Commands::Entities { path, classname } => entities(&path, cli.variant, classname.as_deref(), json),
        Commands::Props { path } => props(&path, cli.variant, json),
        Commands::Vhv { path } => vhv(&path, json),
        Commands::Mdl { path } => mdl(&path, cli.variant, json),
    };

    if let Err(e) = result {
        if json {
            let err = json!({ "success": false, "error": e.to_string() });
            println!("{}", serde_json::to_string_pretty(&err).unwrap_or_default());
        } else {
            eprintln!("error: {e}");
        }
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> CliResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn header(path: &Path, variant: ProducerVariant, json: bool) -> CliResult {
    let mut bsp = BspBuilder::new().variant(variant).open(path)?;
    let checksum = bsp.map_checksum()?;
    let header = bsp.header();

    if json {
        return print_json(&json!({
            "version": header.version,
            "map_revision": header.map_revision,
            "variant": variant,
            "checksum": checksum,
        }));
    }
    println!("version:      {}", header.version);
    println!("map revision: {}", header.map_revision);
    println!("variant:      {variant}");
    println!("checksum:     {checksum:#010x}");
    Ok(())
}

#[derive(Serialize)]
struct LumpRow {
    index: u8,
    name: &'static str,
    version: i32,
    offset: u32,
    length: u32,
    state: SlotState,
    error: Option<String>,
}

fn lumps(path: &Path, variant: ProducerVariant, json: bool) -> CliResult {
    let mut bsp = BspBuilder::new().variant(variant).decode_audible_sets(true).open(path)?;

    let mut rows = Vec::new();
    for lump in LumpId::ALL {
        let region = *bsp.region(lump);
        let error = bsp.decode(lump).err().map(|e| e.to_string());
        rows.push(LumpRow {
            index: region.index,
            name: lump.name(),
            version: region.version,
            offset: region.offset,
            length: region.length,
            state: bsp.slot_state(lump),
            error,
        });
    }

    if json {
        return print_json(&json!({
            "lumps": rows,
            "diagnostics": bsp.diagnostics(),
            "aborted": bsp.poisoned().map(|e| e.to_string()),
        }));
    }
    println!("{:>3}  {:<32} {:>3} {:>10} {:>10}  status", "#", "name", "ver", "offset", "length");
    for row in &rows {
        let status = match (&row.error, row.state) {
            (Some(e), _) => e.clone(),
            (None, SlotState::Absent) => "-".to_string(),
            (None, _) => "ok".to_string(),
        };
        println!(
            "{:>3}  {:<32} {:>3} {:>10} {:>10}  {}",
            row.index, row.name, row.version, row.offset, row.length, status
        );
    }
    for diagnostic in bsp.diagnostics() {
        println!("warning: {diagnostic}");
    }
    if let Some(err) = bsp.poisoned() {
        println!("aborted: {err}");
    }
    Ok(())
}

fn entities(path: &Path, variant: ProducerVariant, classname: Option<&str>, json: bool) -> CliResult {
    let mut bsp = BspBuilder::new().variant(variant).open(path)?;
    let Some(entities) = bsp.entities()? else {
        return Ok(());
    };
    let selected: Vec<_> = entities
        .iter()
        .filter(|kv| classname.map_or(true, |c| kv.classname() == Some(c)))
        .collect();

    if json {
        return print_json(&selected);
    }
    for kv in selected {
        println!("{{");
        for (key, value) in kv.iter() {
            println!("  \"{key}\" \"{value}\"");
        }
        println!("}}");
    }
    Ok(())
}

fn props(path: &Path, variant: ProducerVariant, json: bool) -> CliResult {
    let mut bsp = BspBuilder::new().variant(variant).open(path)?;
    let Some(game_lump) = bsp.game_lump()? else {
        return Ok(());
    };

    for entry in &game_lump.entries {
        if let Err(e) = &entry.data {
            eprintln!("game lump {} v{}: {e}", entry.header.four_cc, entry.header.version);
        }
    }
    let Some(lump) = game_lump.static_props() else {
        return Ok(());
    };

    if json {
        return print_json(lump);
    }
    for (i, prop) in lump.props.iter().enumerate() {
        let base = prop.base();
        let o = base.origin;
        println!(
            "{i:>5}  v{}  {:<48} ({:.1} {:.1} {:.1}) skin {}",
            prop.version(),
            lump.model_name(prop).unwrap_or("?"),
            o.x,
            o.y,
            o.z,
            base.skin
        );
    }
    Ok(())
}

fn vhv(path: &Path, json: bool) -> CliResult {
    let file = VhvFile::open(path)?;
    if json {
        return print_json(&file);
    }
    let h = &file.header;
    println!(
        "checksum {:#010x}  flags {:?}  {} vertices in {} meshes",
        h.checksum, h.vertex_flags, h.vertex_count, h.mesh_count
    );
    for (i, mesh) in file.meshes.iter().enumerate() {
        println!("  mesh {i}: lod {} {} vertices at {}", mesh.lod, mesh.vertex_count, mesh.offset);
    }
    Ok(())
}

fn mdl(path: &Path, variant: ProducerVariant, json: bool) -> CliResult {
    let mut file = if variant == ProducerVariant::Ps3 {
        MdlFile::with_variant(std::io::BufReader::new(std::fs::File::open(path)?), variant)?
    } else {
        MdlFile::open(path)?
    };
    let bones = file.bones()?;

    if json {
        return print_json(&json!({
            "header": file.header(),
            "header2": file.header2(),
            "bones": bones.as_slice(),
        }));
    }
    let h = file.header();
    println!("{} (version {}, checksum {:#010x})", h.name, h.version, h.checksum);
    println!("flags: {:?}", h.flags);
    for (i, bone) in bones.iter().enumerate() {
        println!("  bone {i}: {} parent {}", bone.name, bone.parent);
    }
    Ok(())
}
