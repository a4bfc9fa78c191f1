//! Fluid container items (buckets, cells, bottles) and the empty items they
//! turn back into.
//!
//! Definitions arrive as loosely-shaped JSON, from the built-in defaults or
//! from other add-ons over script events. Anything that does not normalize
//! to a positive amount and a fluid type is skipped.

use std::collections::BTreeMap;

use conduit_core::registry::Registry;
use conduit_core::script::{ScriptEvent, channels};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{info, warn};

// ===========================================================================
// Amounts
// ===========================================================================

/// Accepted amount in millibuckets, `min <= max`, both non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AmountRange {
    pub min: u64,
    pub max: u64,
}

fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| !v.is_null())
}

/// Floors numbers and numeric strings; anything else, or anything below
/// one, reads as zero.
fn clamp_amount(value: Option<&Value>) -> u64 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw.map(f64::floor) {
        Some(n) if n.is_finite() && n >= 1.0 => n as u64,
        _ => 0,
    }
}

impl AmountRange {
    pub fn exact(amount: u64) -> Option<Self> {
        (amount > 0).then_some(Self {
            min: amount,
            max: amount,
        })
    }

    fn from_bounds(raw_min: Option<&Value>, raw_max: Option<&Value>) -> Option<Self> {
        let max = clamp_amount(present(raw_max).or(present(raw_min)));
        if max == 0 {
            return None;
        }
        let min = match clamp_amount(present(raw_min)) {
            0 => max,
            min => min,
        };
        Some(Self {
            min: min.min(max),
            max: min.max(max),
        })
    }

    /// Accepts `1000`, `[250, 1000]` or `{"min": 250, "max": 1000}`.
    pub fn parse(value: &Value) -> Option<Self> {
        match value {
            Value::Number(_) => Self::exact(clamp_amount(Some(value))),
            Value::Array(items) => Self::from_bounds(items.first(), items.get(1)),
            Value::Object(map) => {
                let raw_min = present(map.get("min"))
                    .or(present(map.get("minimum")))
                    .or(present(map.get("0")));
                let raw_max = present(map.get("max"))
                    .or(present(map.get("maximum")))
                    .or(present(map.get("1")));
                Self::from_bounds(raw_min, raw_max)
            }
            _ => None,
        }
    }

    pub fn contains(&self, amount: u64) -> bool {
        (self.min..=self.max).contains(&amount)
    }
}

fn sanitize_type(value: &str) -> String {
    value.trim().to_lowercase()
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}

// ===========================================================================
// Definitions
// ===========================================================================

/// An item that empties into a tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidContainerDef {
    /// Amount inserted, the top of `range`.
    pub amount: u64,
    pub range: AmountRange,
    /// Lowercased fluid type, e.g. `"water"`.
    pub fluid: String,
    /// Item handed back after emptying.
    pub output: Option<String>,
}

impl FluidContainerDef {
    pub fn from_json(definition: &Map<String, Value>) -> Option<Self> {
        let range = AmountRange::parse(definition.get("amount")?)?;
        let fluid = sanitize_type(definition.get("type")?.as_str()?);
        if fluid.is_empty() {
            return None;
        }
        Some(Self {
            amount: range.max,
            range,
            fluid,
            output: non_empty_str(definition.get("output")).map(str::to_string),
        })
    }
}

/// An empty item that can be filled from a tank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidOutputDef {
    /// Amount drained per fill, the top of `range`.
    pub amount: u64,
    pub range: AmountRange,
    /// Fluid type to filled item id.
    pub fills: BTreeMap<String, String>,
}

impl FluidOutputDef {
    pub fn from_json(definition: &Map<String, Value>) -> Option<Self> {
        let amount = present(definition.get("amount")).or(present(definition.get("requirement")))?;
        let range = AmountRange::parse(amount)?;
        let raw_fills = ["fills", "outputs", "types"]
            .into_iter()
            .find_map(|key| definition.get(key).and_then(Value::as_object))?;

        let fills: BTreeMap<String, String> = raw_fills
            .iter()
            .filter_map(|(fluid, item)| {
                let fluid = sanitize_type(fluid);
                let item = non_empty_str(Some(item))?;
                (!fluid.is_empty()).then(|| (fluid, item.to_string()))
            })
            .collect();
        if fills.is_empty() {
            return None;
        }
        Some(Self {
            amount: range.max,
            range,
            fills,
        })
    }
}

/// Flattens a batch payload into definitions. An array is taken as is; an
/// object maps ids to definitions, and a definition's own `id` wins.
fn batch_entries(payload: &Value) -> Vec<Map<String, Value>> {
    match payload {
        Value::Array(items) => items.iter().filter_map(Value::as_object).cloned().collect(),
        Value::Object(map) => map
            .iter()
            .filter_map(|(id, definition)| {
                let definition = definition.as_object()?;
                let mut entry = Map::new();
                entry.insert("id".to_string(), Value::String(id.clone()));
                entry.extend(definition.clone());
                Some(entry)
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Every id an entry registers under: its `ids` list, then its `id`.
fn entry_ids(entry: &Map<String, Value>) -> Vec<String> {
    let listed = entry
        .get("ids")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|id| non_empty_str(Some(id)));
    listed
        .chain(non_empty_str(entry.get("id")))
        .map(str::to_string)
        .collect()
}

// ===========================================================================
// FluidRegistry
// ===========================================================================

#[derive(Debug, Clone, Default)]
pub struct FluidRegistry {
    containers: Registry<FluidContainerDef>,
    outputs: Registry<FluidOutputDef>,
}

impl FluidRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Buckets, bottles and fluid cells known out of the box.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_container_batch(&json!([
            { "id": "minecraft:lava_bucket", "amount": 1000, "type": "lava", "output": "minecraft:bucket" },
            { "id": "minecraft:water_bucket", "amount": 1000, "type": "water", "output": "minecraft:bucket" },
            { "id": "minecraft:milk_bucket", "amount": 1000, "type": "milk", "output": "minecraft:bucket" },
            { "id": "minecraft:experience_bottle", "amount": 8, "type": "xp", "output": "minecraft:glass_bottle" },
            { "id": "fluidcells:water_cell", "amount": 4000, "type": "water", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:water_cell_2", "amount": 3000, "type": "water", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:water_cell_3", "amount": 2000, "type": "water", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:water_cell_4", "amount": 1000, "type": "water", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:lava_cell", "amount": 4000, "type": "lava", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:lava_cell_2", "amount": 3000, "type": "lava", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:lava_cell_3", "amount": 2000, "type": "lava", "output": "fluidcells:empty_cell" },
            { "id": "fluidcells:lava_cell_4", "amount": 1000, "type": "lava", "output": "fluidcells:empty_cell" }
        ]));
        registry.register_output_batch(&json!([
            {
                "id": "minecraft:bucket",
                "amount": 1000,
                "fills": {
                    "water": "minecraft:water_bucket",
                    "lava": "minecraft:lava_bucket",
                    "milk": "minecraft:milk_bucket"
                }
            },
            {
                "id": "fluidcells:empty_cell",
                "amount": { "min": 1000, "max": 4000 },
                "fills": {
                    "water": "fluidcells:water_cell",
                    "lava": "fluidcells:lava_cell"
                }
            }
        ]));
        registry
    }

    pub fn container(&self, id: &str) -> Option<&FluidContainerDef> {
        self.containers.lookup(id)
    }

    pub fn output(&self, id: &str) -> Option<&FluidOutputDef> {
        self.outputs.lookup(id)
    }

    /// Container items in registration order.
    pub fn containers(&self) -> impl Iterator<Item = (&str, &FluidContainerDef)> {
        self.containers.iter().map(|(_, id, def)| (id, def))
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn output_count(&self) -> usize {
        self.outputs.len()
    }

    /// The item `output_id` becomes when filled with `fluid`.
    pub fn filled_item(&self, output_id: &str, fluid: &str) -> Option<&str> {
        self.output(output_id)?
            .fills
            .get(&sanitize_type(fluid))
            .map(String::as_str)
    }

    /// Registers or replaces one container item. Returns `false` if the
    /// definition does not normalize.
    pub fn register_container(&mut self, id: &str, definition: &Value) -> bool {
        let normalized = definition.as_object().and_then(FluidContainerDef::from_json);
        match normalized {
            Some(def) if !id.is_empty() => {
                self.containers.upsert(id, def);
                true
            }
            _ => false,
        }
    }

    pub fn register_output(&mut self, id: &str, definition: &Value) -> bool {
        let normalized = definition.as_object().and_then(FluidOutputDef::from_json);
        match normalized {
            Some(def) if !id.is_empty() => {
                self.outputs.upsert(id, def);
                true
            }
            _ => false,
        }
    }

    /// Registers every valid entry of an array or id-keyed object. Returns
    /// the number of ids registered.
    pub fn register_container_batch(&mut self, payload: &Value) -> usize {
        let mut registered = 0;
        for entry in batch_entries(payload) {
            let Some(def) = FluidContainerDef::from_json(&entry) else {
                continue;
            };
            for id in entry_ids(&entry) {
                self.containers.upsert(&id, def.clone());
                registered += 1;
            }
        }
        registered
    }

    pub fn register_output_batch(&mut self, payload: &Value) -> usize {
        let mut registered = 0;
        for entry in batch_entries(payload) {
            let Some(def) = FluidOutputDef::from_json(&entry) else {
                continue;
            };
            for id in entry_ids(&entry) {
                self.outputs.upsert(&id, def.clone());
                registered += 1;
            }
        }
        registered
    }

    /// Handles the two registration channels. Returns `None` for other
    /// channels, otherwise the number of ids registered. Bad JSON is logged
    /// and registers nothing.
    pub fn handle_script_event(&mut self, event: &ScriptEvent) -> Option<usize> {
        let is_container = match event.channel.as_str() {
            channels::REGISTER_FLUID_CONTAINER => true,
            channels::REGISTER_FLUID_OUTPUT => false,
            _ => return None,
        };
        let payload = event.payload.trim();
        if payload.is_empty() {
            return Some(0);
        }
        let parsed: Value = match serde_json::from_str(payload) {
            Ok(value) => value,
            Err(err) => {
                warn!(channel = %event.channel, %err, "failed to parse fluid registration");
                return Some(0);
            }
        };
        let added = if is_container {
            self.register_container_batch(&parsed)
        } else {
            self.register_output_batch(&parsed)
        };
        if added > 0 {
            info!(channel = %event.channel, added, "registered fluid items");
        }
        Some(added)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_shapes() {
        assert_eq!(AmountRange::parse(&json!(1000)), AmountRange::exact(1000));
        assert_eq!(AmountRange::parse(&json!(12.9)), AmountRange::exact(12));
        assert_eq!(AmountRange::parse(&json!(0)), None);
        assert_eq!(AmountRange::parse(&json!(-5)), None);
        assert_eq!(
            AmountRange::parse(&json!([4000, 1000])),
            Some(AmountRange { min: 1000, max: 4000 })
        );
        assert_eq!(AmountRange::parse(&json!([500])), AmountRange::exact(500));
        assert_eq!(
            AmountRange::parse(&json!({ "minimum": 250, "maximum": "750" })),
            Some(AmountRange { min: 250, max: 750 })
        );
        assert_eq!(AmountRange::parse(&json!({ "min": 300 })), AmountRange::exact(300));
        assert_eq!(AmountRange::parse(&json!({ "min": 0, "max": 40 })), AmountRange::exact(40));
        assert_eq!(AmountRange::parse(&json!("1000")), None);
        assert!(AmountRange { min: 1, max: 3 }.contains(2));
    }

    #[test]
    fn container_normalization() {
        let mut registry = FluidRegistry::new();
        assert!(registry.register_container("a:cell", &json!({ "amount": 2000, "type": " Water ", "output": "" })));
        let def = registry.container("a:cell").unwrap();
        assert_eq!(def.fluid, "water");
        assert_eq!(def.output, None);

        assert!(!registry.register_container("a:bad", &json!({ "amount": 2000, "type": "  " })));
        assert!(!registry.register_container("a:bad", &json!({ "amount": 0, "type": "lava" })));
        assert!(!registry.register_container("", &json!({ "amount": 10, "type": "lava" })));
        assert_eq!(registry.container_count(), 1);
    }

    #[test]
    fn batch_from_array_and_object() {
        let mut registry = FluidRegistry::new();
        let added = registry.register_container_batch(&json!([
            { "ids": ["x:a", "x:b"], "id": "x:c", "amount": 100, "type": "oil" },
            { "amount": 100, "type": "oil" },
            "not an object"
        ]));
        assert_eq!(added, 3);

        let added = registry.register_container_batch(&json!({
            "y:a": { "amount": [10, 20], "type": "honey" },
            "y:b": { "id": "y:renamed", "amount": 5, "type": "honey" },
            "y:c": 7
        }));
        assert_eq!(added, 2);
        assert_eq!(registry.container("y:a").unwrap().range, AmountRange { min: 10, max: 20 });
        assert!(registry.container("y:renamed").is_some());
        assert!(registry.container("y:b").is_none());
        assert_eq!(registry.register_container_batch(&json!(42)), 0);
    }

    #[test]
    fn outputs_need_fills() {
        let mut registry = FluidRegistry::new();
        assert!(registry.register_output("o:jar", &json!({ "requirement": 250, "outputs": { "Water": "o:water_jar", "lava": "" } })));
        let def = registry.output("o:jar").unwrap();
        assert_eq!(def.fills.len(), 1);
        assert_eq!(registry.filled_item("o:jar", "WATER"), Some("o:water_jar"));
        assert!(!registry.register_output("o:empty", &json!({ "amount": 250, "fills": {} })));
        assert!(!registry.register_output("o:none", &json!({ "amount": 250 })));
    }

    #[test]
    fn defaults() {
        let registry = FluidRegistry::with_defaults();
        assert_eq!(registry.container_count(), 12);
        assert_eq!(registry.output_count(), 2);
        let xp = registry.container("minecraft:experience_bottle").unwrap();
        assert_eq!((xp.amount, xp.fluid.as_str()), (8, "xp"));
        assert_eq!(xp.output.as_deref(), Some("minecraft:glass_bottle"));
        assert_eq!(
            registry.output("fluidcells:empty_cell").unwrap().range,
            AmountRange { min: 1000, max: 4000 }
        );
        assert_eq!(registry.filled_item("minecraft:bucket", "milk"), Some("minecraft:milk_bucket"));
    }

    #[test]
    fn script_registration() {
        let mut registry = FluidRegistry::with_defaults();
        let event = ScriptEvent::new(
            channels::REGISTER_FLUID_CONTAINER,
            r#"{"mod:slime_bucket": {"amount": 1000, "type": "slime", "output": "minecraft:bucket"}}"#,
        );
        assert_eq!(registry.handle_script_event(&event), Some(1));
        assert_eq!(registry.container("mod:slime_bucket").unwrap().fluid, "slime");

        let event = ScriptEvent::new(
            channels::REGISTER_FLUID_OUTPUT,
            r#"[{"id": "minecraft:bucket", "amount": 1000, "fills": {"slime": "mod:slime_bucket"}}]"#,
        );
        assert_eq!(registry.handle_script_event(&event), Some(1));
        assert_eq!(registry.filled_item("minecraft:bucket", "water"), None);

        let broken = ScriptEvent::new(channels::REGISTER_FLUID_OUTPUT, "{not json");
        assert_eq!(registry.handle_script_event(&broken), Some(0));
        assert_eq!(registry.handle_script_event(&ScriptEvent::new(channels::UPDATE_PIPES, "")), None);
    }
}
