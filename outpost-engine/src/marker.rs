//! Marker signs and their handlers.
//!
//! A marker is a sign whose first line is a bracketed tag, e.g. `[mob]`.
//! The remaining three lines are positional arguments. Handlers are looked
//! up by tag in a [`MarkerRegistry`]; third parties register their own.

use std::collections::HashMap;
use std::sync::Arc;

use outpost_world::{BlockPos, Facing, Sign};
use rand::{Rng, RngCore};

use crate::error::MarkerError;
use crate::structure::{StructureDefinition, SubBlueprint};

pub const MOB: &str = "mob";
pub const COMMAND: &str = "command";
pub const NPC: &str = "npc";
pub const SCHEMATIC: &str = "schematic";
pub const ADV_SCHEMATIC: &str = "advschematic";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Lower-cased tag without brackets.
    pub tag: String,
    /// Sign lines after the tag, trimmed, trailing blanks dropped.
    pub args: Vec<String>,
}

impl Marker {
    pub fn parse(sign: &Sign) -> Option<Self> {
        let first = sign.lines[0].trim();
        let tag = first.strip_prefix('[')?.strip_suffix(']')?.trim();
        if tag.is_empty() {
            return None;
        }
        let mut args: Vec<String> = sign.lines[1..].iter().map(|l| l.trim().to_string()).collect();
        while args.last().is_some_and(String::is_empty) {
            args.pop();
        }
        Some(Self {
            tag: tag.to_ascii_lowercase(),
            args,
        })
    }
}

/// What a resolved marker asks the engine to do. The marker cell is
/// cleared before the effect is applied.
#[derive(Debug, Clone, PartialEq)]
pub enum MarkerEffect {
    SpawnEntity { kind: String, count: u32 },
    /// Console command, delivered to observers.
    Command(String),
    /// Third-party integration, delivered to observers.
    Hook { plugin: String, args: Vec<String> },
    /// Place a child blueprint at the marker, one level deeper.
    SubBlueprint(SubBlueprint),
}

pub struct MarkerContext<'a> {
    pub location: BlockPos,
    pub facing: Facing,
    pub world: &'a str,
    pub structure: &'a StructureDefinition,
    pub rng: &'a mut dyn RngCore,
}

pub trait MarkerHandler: Send + Sync {
    fn resolve(&self, args: &[String], ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError>;
}

fn arg<'a>(tag: &str, args: &'a [String], index: usize) -> Result<&'a str, MarkerError> {
    match args.get(index).map(String::as_str) {
        Some(a) if !a.is_empty() => Ok(a),
        _ => Err(MarkerError::MissingArgument { tag: tag.to_string(), index }),
    }
}

/// `[mob]` / entity id / optional count.
pub struct MobHandler;

impl MarkerHandler for MobHandler {
    fn resolve(&self, args: &[String], _ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
        let kind = outpost_world::normalize_kind(arg(MOB, args, 0)?);
        let count = match args.get(1).filter(|a| !a.is_empty()) {
            Some(n) => n.parse::<u32>().ok().filter(|n| *n > 0).ok_or_else(|| MarkerError::InvalidArgument {
                tag: MOB.to_string(),
                value: n.clone(),
            })?,
            None => 1,
        };
        Ok(MarkerEffect::SpawnEntity { kind, count })
    }
}

/// `[command]` / command split across the remaining lines.
///
/// `<x>`, `<y>`, `<z>`, `<world>` and `<structure>` are substituted.
pub struct CommandHandler;

impl MarkerHandler for CommandHandler {
    fn resolve(&self, args: &[String], ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
        arg(COMMAND, args, 0)?;
        let command = args
            .iter()
            .filter(|a| !a.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
            .replace("<x>", &ctx.location.x.to_string())
            .replace("<y>", &ctx.location.y.to_string())
            .replace("<z>", &ctx.location.z.to_string())
            .replace("<world>", ctx.world)
            .replace("<structure>", ctx.structure.name());
        Ok(MarkerEffect::Command(command.trim_start_matches('/').to_string()))
    }
}

/// `[npc]` / npc name, handed to whatever NPC integration is listening.
pub struct NpcHandler;

impl MarkerHandler for NpcHandler {
    fn resolve(&self, args: &[String], _ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
        arg(NPC, args, 0)?;
        Ok(MarkerEffect::Hook {
            plugin: NPC.to_string(),
            args: args.to_vec(),
        })
    }
}

/// `[schematic]` / optional selector into the structure's sub-blueprint list:
/// nothing for a uniform pick, `N` for the N-th entry (1-based), `A-B` for a
/// uniform pick in the inclusive range.
pub struct SchematicHandler;

impl SchematicHandler {
    fn select(selector: Option<&str>, len: usize, rng: &mut dyn RngCore) -> Result<usize, MarkerError> {
        let invalid = |value: &str| MarkerError::InvalidArgument {
            tag: SCHEMATIC.to_string(),
            value: value.to_string(),
        };
        let in_range = |n: usize| (1..=len).contains(&n);

        let Some(selector) = selector.filter(|s| !s.is_empty()) else {
            return Ok(rng.gen_range(0..len));
        };
        if let Some((a, b)) = selector.split_once('-') {
            let a: usize = a.trim().parse().map_err(|_| invalid(selector))?;
            let b: usize = b.trim().parse().map_err(|_| invalid(selector))?;
            if a > b || !in_range(a) || !in_range(b) {
                return Err(invalid(selector));
            }
            return Ok(rng.gen_range(a..=b) - 1);
        }
        let n: usize = selector.parse().map_err(|_| invalid(selector))?;
        if !in_range(n) {
            return Err(invalid(selector));
        }
        Ok(n - 1)
    }
}

impl MarkerHandler for SchematicHandler {
    fn resolve(&self, args: &[String], ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
        let subs = ctx.structure.sub_blueprints();
        if subs.is_empty() {
            return Err(MarkerError::NoSubBlueprints { tag: SCHEMATIC.to_string() });
        }
        let index = Self::select(args.first().map(String::as_str), subs.len(), &mut *ctx.rng)?;
        Ok(MarkerEffect::SubBlueprint(subs[index].clone()))
    }
}

/// `[advschematic]` / category name: weighted draw from that category.
pub struct AdvancedSchematicHandler;

impl MarkerHandler for AdvancedSchematicHandler {
    fn resolve(&self, args: &[String], ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
        let name = arg(ADV_SCHEMATIC, args, 0)?;
        let unknown = || MarkerError::UnknownCategory {
            tag: ADV_SCHEMATIC.to_string(),
            category: name.to_string(),
        };
        let category = ctx.structure.category(name).ok_or_else(unknown)?;
        let sub = category.try_next(&mut *ctx.rng).ok_or_else(unknown)?;
        Ok(MarkerEffect::SubBlueprint(sub.clone()))
    }
}

#[derive(Clone, Default)]
pub struct MarkerRegistry {
    handlers: HashMap<String, Arc<dyn MarkerHandler>>,
}

impl MarkerRegistry {
    /// Registry with the built-in handlers.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(MOB, MobHandler);
        registry.register(COMMAND, CommandHandler);
        registry.register(NPC, NpcHandler);
        registry.register(SCHEMATIC, SchematicHandler);
        registry.register(ADV_SCHEMATIC, AdvancedSchematicHandler);
        registry
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Register or replace the handler for `tag` (case-insensitive, no brackets).
    pub fn register(&mut self, tag: &str, handler: impl MarkerHandler + 'static) {
        self.handlers.insert(tag.to_ascii_lowercase(), Arc::new(handler));
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn MarkerHandler>> {
        self.handlers.get(tag).cloned()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn structure() -> StructureDefinition {
        let mut tall = SubBlueprint::new("tower_top");
        tall.use_rotation = false;
        StructureDefinition::builder("keep")
            .schematic("keep")
            .chance(1, 1)
            .sub_blueprint(SubBlueprint::new("room_a"))
            .sub_blueprint(SubBlueprint::new("room_b"))
            .sub_blueprint(SubBlueprint::new("room_c"))
            .category("roofs", 1.0, SubBlueprint::new("flat_roof"))
            .category("roofs", 3.0, tall)
            .build()
            .expect("valid")
    }

    fn resolve(tag: &str, args: &[&str], seed: u64) -> Result<MarkerEffect, MarkerError> {
        let def = structure();
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut ctx = MarkerContext {
            location: BlockPos::new(10, 70, -4),
            facing: Facing::East,
            world: "world",
            structure: &def,
            rng: &mut rng,
        };
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let registry = MarkerRegistry::new();
        let handler = registry.get(tag).expect("registered");
        handler.resolve(&args, &mut ctx)
    }

    fn sub_name(effect: Result<MarkerEffect, MarkerError>) -> String {
        match effect {
            Ok(MarkerEffect::SubBlueprint(sub)) => sub.schematic,
            other => panic!("expected a sub-blueprint, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_marker_sign() {
        let sign = Sign::new(Facing::North, ["  [Mob] ", "zombie", "3", ""]);
        let marker = Marker::parse(&sign).expect("marker");
        assert_eq!(marker.tag, "mob");
        assert_eq!(marker.args, vec!["zombie", "3"]);

        assert!(Marker::parse(&Sign::new(Facing::North, ["Welcome", "", "", ""])).is_none());
        assert!(Marker::parse(&Sign::new(Facing::North, ["[]", "", "", ""])).is_none());
    }

    #[test]
    fn test_mob_marker() {
        assert_eq!(
            resolve(MOB, &["zombie", "3"], 1),
            Ok(MarkerEffect::SpawnEntity { kind: "minecraft:zombie".into(), count: 3 })
        );
        assert_eq!(
            resolve(MOB, &["minecraft:skeleton"], 1),
            Ok(MarkerEffect::SpawnEntity { kind: "minecraft:skeleton".into(), count: 1 })
        );
        assert!(matches!(resolve(MOB, &[], 1), Err(MarkerError::MissingArgument { index: 0, .. })));
        assert!(matches!(resolve(MOB, &["zombie", "lots"], 1), Err(MarkerError::InvalidArgument { .. })));
    }

    #[test]
    fn test_command_marker_substitutes_placeholders() {
        assert_eq!(
            resolve(COMMAND, &["/say <structure> at", "<x> <y> <z>", "in <world>"], 1),
            Ok(MarkerEffect::Command("say keep at 10 70 -4 in world".into()))
        );
    }

    #[test]
    fn test_schematic_selectors() {
        assert_eq!(sub_name(resolve(SCHEMATIC, &["2"], 1)), "room_b");
        for seed in 0..20 {
            let name = sub_name(resolve(SCHEMATIC, &["2-3"], seed));
            assert!(name == "room_b" || name == "room_c", "{name}");
            let any = sub_name(resolve(SCHEMATIC, &[], seed));
            assert!(any.starts_with("room_"));
        }
        assert!(matches!(resolve(SCHEMATIC, &["4"], 1), Err(MarkerError::InvalidArgument { .. })));
        assert!(matches!(resolve(SCHEMATIC, &["3-1"], 1), Err(MarkerError::InvalidArgument { .. })));
        assert!(matches!(resolve(SCHEMATIC, &["0"], 1), Err(MarkerError::InvalidArgument { .. })));
    }

    #[test]
    fn test_advanced_schematic_weighted_category() {
        let tall = (0..400)
            .filter(|seed| sub_name(resolve(ADV_SCHEMATIC, &["roofs"], *seed)) == "tower_top")
            .count();
        // Weight 3 of 4
        assert!((250..350).contains(&tall), "tall = {tall}");

        assert!(matches!(
            resolve(ADV_SCHEMATIC, &["cellars"], 1),
            Err(MarkerError::UnknownCategory { .. })
        ));
    }

    #[test]
    fn test_custom_handler_registration() {
        struct Beacon;
        impl MarkerHandler for Beacon {
            fn resolve(&self, _args: &[String], ctx: &mut MarkerContext<'_>) -> Result<MarkerEffect, MarkerError> {
                Ok(MarkerEffect::Hook { plugin: "beacon".into(), args: vec![ctx.facing.name().into()] })
            }
        }
        let mut registry = MarkerRegistry::empty();
        registry.register("Beacon", Beacon);
        assert!(registry.contains("beacon"));
        assert!(!registry.contains(MOB));
    }
}
