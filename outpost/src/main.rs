use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use outpost_engine::{Engine, EngineSettings, LootRegistry, PlacementObserver, PlacementRecord, StructureDefinition, config};
use outpost_schematic::{BlueprintStore, MarkerIndex, NbtBlueprintStore};
use outpost_storage::{MemoryDatabase, PlacedStructure, StructureDatabase};
use outpost_world::{BlockPos, ChunkPos, FlatGenerator, MemoryWorld, TerrainGenerator};

#[derive(Parser)]
#[command(name = "outpost", about = "Structure placement simulator over a flat test world")]
pub struct Args {
    /// Directory holding structures/, loot/ and an optional outpost.json
    #[arg(short, long, default_value = "config", env = "OUTPOST_CONFIG")]
    pub config: PathBuf,

    /// Directory of .nbt blueprints and compiled .json indexes
    #[arg(short, long, default_value = "schematics", env = "OUTPOST_SCHEMATICS")]
    pub schematics: PathBuf,

    /// World name structures are matched against
    #[arg(short, long, default_value = "world")]
    pub world: String,

    /// Random seed for every draw the engine makes
    #[arg(long, default_value = "0")]
    pub seed: u64,

    /// Surface height of the flat terrain
    #[arg(long, default_value = "64")]
    pub surface_y: i32,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Load every chunk within a radius and report what got placed
    Scan {
        /// Radius in chunks around 0,0
        #[arg(short, long, default_value = "8")]
        radius: i32,

        /// Give up after this many ticks
        #[arg(long, default_value = "100000")]
        max_ticks: u64,

        /// Write placement records to this JSON file
        #[arg(long)]
        records: Option<PathBuf>,
    },
    /// Place one structure by name, skipping eligibility checks
    Place {
        name: String,
        x: i32,
        y: i32,
        z: i32,

        #[arg(long, default_value = "1000")]
        max_ticks: u64,
    },
    /// Write the marker index of a blueprint next to it
    Compile { blueprint: String },
}

/// Forwards completed placements to the async side.
struct ChannelObserver {
    tx: UnboundedSender<PlacementRecord>,
}

impl PlacementObserver for ChannelObserver {
    fn on_structure_placed(&mut self, record: &PlacementRecord) {
        if self.tx.send(record.clone()).is_err() {
            log::warn!("Placement record for {} dropped, receiver gone", record.structure);
        }
    }
}

struct Loaded {
    settings: EngineSettings,
    loot: LootRegistry,
    structures: Vec<StructureDefinition>,
}

fn load(args: &Args) -> Result<Loaded> {
    let settings = config::load_settings(Some(&args.config.join("outpost.json"))).context("Failed to load settings")?;
    let (loot, bad_loot) = config::load_loot_tables(&args.config.join("loot")).context("Failed to load loot tables")?;
    let (structures, bad) =
        config::load_structures(&args.config.join("structures"), &loot).context("Failed to load structures")?;
    if !bad_loot.is_empty() || !bad.is_empty() {
        println!("Skipped {} loot tables and {} structures (see log)", bad_loot.len(), bad.len());
    }
    Ok(Loaded {
        settings,
        loot,
        structures,
    })
}

fn build_engine(args: &Args, loaded: Loaded) -> (Engine<MemoryWorld>, UnboundedReceiver<PlacementRecord>) {
    let store: Arc<dyn BlueprintStore> = Arc::new(NbtBlueprintStore::new(&args.schematics));
    let world = MemoryWorld::new(&args.world);
    let mut engine = Engine::new(world, store, loaded.loot, loaded.structures, loaded.settings, args.seed);
    let (tx, rx) = mpsc::unbounded_channel();
    engine.subscribe(ChannelObserver { tx });
    (engine, rx)
}

fn generate(engine: &mut Engine<MemoryWorld>, generator: &FlatGenerator, chunks: &[ChunkPos]) -> Result<()> {
    for chunk in chunks {
        generator
            .generate_chunk(engine.world_mut(), *chunk)
            .with_context(|| format!("Failed to generate chunk {}", chunk))?;
    }
    Ok(())
}

/// Stamp and store every record the engine emitted so far.
async fn drain(
    rx: &mut UnboundedReceiver<PlacementRecord>,
    db: &dyn StructureDatabase,
    tick: u64,
) -> Result<usize> {
    let mut stored = 0;
    while let Ok(record) = rx.try_recv() {
        db.record(PlacedStructure {
            structure: record.structure,
            world: record.world,
            min: record.min,
            max: record.max,
            rotation: record.rotation,
            tick,
        })
        .await?;
        stored += 1;
    }
    Ok(stored)
}

/// Tick until the engine is idle, storing records as they arrive.
async fn run(
    engine: &mut Engine<MemoryWorld>,
    rx: &mut UnboundedReceiver<PlacementRecord>,
    db: &dyn StructureDatabase,
    max_ticks: u64,
) -> Result<()> {
    let start = engine.now();
    while !engine.context().scheduler.is_idle() {
        if engine.now() - start >= max_ticks {
            bail!("Engine still busy after {} ticks", max_ticks);
        }
        engine.tick().context("Placement stopped on a fatal error")?;
        drain(rx, db, engine.now()).await?;
    }
    Ok(())
}

async fn scan(args: &Args, radius: i32, max_ticks: u64, records: Option<&PathBuf>) -> Result<()> {
    let loaded = load(args)?;
    if loaded.structures.is_empty() {
        bail!("No valid structures in {:?}", args.config.join("structures"));
    }
    let (mut engine, mut rx) = build_engine(args, loaded);
    let db = MemoryDatabase::new();

    let generator = FlatGenerator {
        surface_y: args.surface_y,
        ..FlatGenerator::default()
    };
    let mut chunks = Vec::new();
    for cx in -radius..=radius {
        for cz in -radius..=radius {
            chunks.push(ChunkPos::new(cx, cz));
        }
    }
    generate(&mut engine, &generator, &chunks)?;
    println!("Generated {} chunks, scanning with {} structures", chunks.len(), engine.registry().len());

    for chunk in &chunks {
        engine.on_chunk_load(*chunk);
        engine.tick().context("Placement stopped on a fatal error")?;
        drain(&mut rx, &db, engine.now()).await?;
    }
    run(&mut engine, &mut rx, &db, max_ticks).await?;

    let placed = db.all().await;
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for p in &placed {
        *counts.entry(p.structure.as_str()).or_default() += 1;
    }
    println!("Placed {} structures in {} ticks", placed.len(), engine.now());
    for (name, count) in &counts {
        let nearest = db.nearest(&args.world, 0, 0, Some(name)).await?;
        match nearest {
            Some(n) => println!("  {:<24} {:>5}  nearest to spawn at {:?}", name, count, n.center()),
            None => println!("  {:<24} {:>5}", name, count),
        }
    }

    if let Some(path) = records {
        db.export(path).await?;
        println!("Wrote records to {:?}", path);
    }
    Ok(())
}

async fn place(args: &Args, name: &str, anchor: BlockPos, max_ticks: u64) -> Result<()> {
    let loaded = load(args)?;
    let (mut engine, mut rx) = build_engine(args, loaded);
    let db = MemoryDatabase::new();

    let generator = FlatGenerator {
        surface_y: args.surface_y,
        ..FlatGenerator::default()
    };
    let center = anchor.chunk();
    let around: Vec<ChunkPos> = (-1..=1)
        .flat_map(|dx| (-1..=1).map(move |dz| ChunkPos::new(center.x + dx, center.z + dz)))
        .collect();
    generate(&mut engine, &generator, &around)?;

    let paste = engine
        .place_now(name, anchor)
        .with_context(|| format!("Failed to place {} at {}", name, anchor))?;
    println!("Pasted {} at {} ({}°, {} cells)", paste.blueprint, paste.location, paste.rotation.degrees(), paste.cells_written);

    run(&mut engine, &mut rx, &db, max_ticks).await?;
    for p in db.all().await {
        println!("Completed {} in {} at {}..{}", p.structure, p.world, p.min, p.max);
    }
    Ok(())
}

fn compile(args: &Args, blueprint: &str) -> Result<()> {
    let store = NbtBlueprintStore::new(&args.schematics);
    let loaded = store
        .load(blueprint)
        .with_context(|| format!("Failed to load blueprint {}", blueprint))?;
    let index = MarkerIndex::compile(&loaded);
    store
        .save_compiled(blueprint, &index)
        .with_context(|| format!("Failed to write marker index for {}", blueprint))?;
    println!("Compiled {} ({} marker/container cells)", blueprint, index.positions.len());
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    match &args.command {
        Command::Scan {
            radius,
            max_ticks,
            records,
        } => scan(&args, *radius, *max_ticks, records.as_ref()).await,
        Command::Place { name, x, y, z, max_ticks } => {
            place(&args, name, BlockPos::new(*x, *y, *z), *max_ticks).await
        }
        Command::Compile { blueprint } => compile(&args, blueprint),
    }
}
