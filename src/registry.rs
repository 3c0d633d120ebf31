use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::components::composite::Composite;
use crate::components::latch::{Latch, LatchKind};
use crate::config::EvalConfig;
use crate::document::{CircuitDocument, ElementRecord};
use crate::element::Element;
use crate::error::DocumentError;
use crate::modifier::{self, DelayModifier, Modifier, SwitchAfterTicksModifier};
use crate::signal::Signal;

pub type ElementFactory = fn(&ElementRecord, &Registry) -> Result<Element, DocumentError>;
pub type ModifierFactory = fn(&Value) -> Result<Box<dyn Modifier>, DocumentError>;

/// Maps serialized type tags back to constructors.
///
/// Built once by the host and passed to whatever loads documents. Besides
/// plain factories it keeps named composite definitions, each stored as a
/// self-contained document.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    elements: BTreeMap<String, ElementFactory>,
    modifiers: BTreeMap<String, ModifierFactory>,
    composites: BTreeMap<String, CircuitDocument>,
    config: EvalConfig,
}

macro_rules! factory_fn_gen {
    ( $name:ident, $constructor:expr ) => {
        fn $name(_record: &ElementRecord, _registry: &Registry) -> Result<Element, DocumentError> {
            Ok($constructor)
        }
    };
}

factory_fn_gen!(input, Element::input());
factory_fn_gen!(output, Element::output());
factory_fn_gen!(and, Element::and());
factory_fn_gen!(or, Element::or());
factory_fn_gen!(xor, Element::xor());
factory_fn_gen!(not, Element::not());
factory_fn_gen!(switching_and, Element::switching_and());

fn latch(record: &ElementRecord, kind: LatchKind) -> Result<Element, DocumentError> {
    let state = match record.extra.get("state") {
        Some(state) => Signal::deserialize(state).map_err(|err| DocumentError::InvalidField {
            kind: record.kind.clone(),
            field: "state",
            reason: err.to_string(),
        })?,
        None => Signal::Low,
    };
    Ok(Element::from_latch(Latch::with_state(kind, state)))
}

fn rs_latch(record: &ElementRecord, _registry: &Registry) -> Result<Element, DocumentError> {
    latch(record, LatchKind::Rs)
}

fn d_latch(record: &ElementRecord, _registry: &Registry) -> Result<Element, DocumentError> {
    latch(record, LatchKind::D)
}

fn modifier_from<M>(kind: &str, data: &Value) -> Result<Box<dyn Modifier>, DocumentError>
where
    M: Modifier + DeserializeOwned + 'static,
{
    let modifier = M::deserialize(data).map_err(|err| DocumentError::InvalidField {
        kind: kind.to_string(),
        field: "data",
        reason: err.to_string(),
    })?;
    Ok(Box::new(modifier))
}

fn delay(data: &Value) -> Result<Box<dyn Modifier>, DocumentError> {
    modifier_from::<DelayModifier>(modifier::DELAY, data)
}

fn switch_after_ticks(data: &Value) -> Result<Box<dyn Modifier>, DocumentError> {
    modifier_from::<SwitchAfterTicksModifier>(modifier::SWITCH_AFTER_TICKS, data)
}

impl Registry {
    /// An empty registry: every type must be registered by hand.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every element and modifier type this crate ships.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: [(&str, ElementFactory); 9] = [
            ("Input", input),
            ("Output", output),
            ("And", and),
            ("Or", or),
            ("Xor", xor),
            ("Not", not),
            ("SwitchingAnd", switching_and),
            (LatchKind::Rs.tag(), rs_latch),
            (LatchKind::D.tag(), d_latch),
        ];
        for (tag, factory) in builtins {
            registry.register_element(tag, factory);
        }
        registry.register_modifier(modifier::DELAY, delay);
        registry.register_modifier(modifier::SWITCH_AFTER_TICKS, switch_after_ticks);
        registry
    }

    pub fn with_config(mut self, config: EvalConfig) -> Self {
        self.config = config;
        self
    }

    /// Configuration given to every circuit this registry builds, composite
    /// sub-circuits included.
    pub fn config(&self) -> &EvalConfig {
        &self.config
    }

    pub fn register_element(&mut self, tag: impl Into<String>, factory: ElementFactory) {
        self.elements.insert(tag.into(), factory);
    }

    pub fn register_modifier(&mut self, tag: impl Into<String>, factory: ModifierFactory) {
        self.modifiers.insert(tag.into(), factory);
    }

    /// Registers `document` as a composite type called `name`.
    ///
    /// The document is built once right away, so every type it uses must
    /// already be known. What gets stored is the built circuit's own
    /// document, with every nested composite embedded.
    pub fn register_composite(
        &mut self,
        name: impl Into<String>,
        document: &CircuitDocument,
    ) -> Result<(), DocumentError> {
        if let Some(tag) = self.first_unknown(document) {
            return Err(DocumentError::UnknownType(tag.to_string()));
        }
        let name = name.into();
        let composite = Composite::from_document(name.clone(), document, self)?;
        debug!(
            %name,
            inputs = composite.input_names().len(),
            outputs = composite.output_names().len(),
            "registered composite"
        );
        self.composites.insert(name, composite.circuit().to_document());
        Ok(())
    }

    /// First type tag in `document`, at any depth, this registry cannot build.
    fn first_unknown<'a>(&self, document: &'a CircuitDocument) -> Option<&'a str> {
        document.elements.iter().find_map(|record| match &record.subgrid {
            Some(subgrid) => self.first_unknown(subgrid),
            None if self.knows(&record.kind) => None,
            None => Some(record.kind.as_str()),
        })
    }

    /// Registers every `*.json` document in `dir` as a composite named after
    /// its file stem, and returns how many made it. Files may use each
    /// other's types in any order; files that cannot be read, or still use
    /// unknown types once nothing new resolves, are skipped with a warning.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, DocumentError> {
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok().map(|entry| entry.path()))
            .filter(|path| path.extension().map_or(false, |ext| ext == "json"))
            .collect();
        paths.sort();

        let mut pending = Vec::new();
        for path in paths {
            let name = match path.file_stem().and_then(|stem| stem.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };
            match CircuitDocument::from_path(&path) {
                Ok(document) => pending.push((name, path, document)),
                Err(err) => warn!(path = %path.display(), %err, "skipping element file"),
            }
        }

        let mut registered = 0;
        while !pending.is_empty() {
            let before = pending.len();
            let mut deferred = Vec::new();
            for (name, path, document) in pending {
                match self.register_composite(name.clone(), &document) {
                    Ok(()) => registered += 1,
                    Err(err) => deferred.push((name, path, document, err)),
                }
            }
            if deferred.len() == before {
                for (_, path, _, err) in deferred {
                    warn!(path = %path.display(), %err, "skipping element file");
                }
                break;
            }
            pending = deferred
                .into_iter()
                .map(|(name, path, document, _)| (name, path, document))
                .collect();
        }
        Ok(registered)
    }

    pub fn knows(&self, tag: &str) -> bool {
        self.elements.contains_key(tag) || self.composites.contains_key(tag)
    }

    /// Every type tag that can be instantiated, factories first.
    pub fn element_names(&self) -> Vec<&str> {
        self.elements
            .keys()
            .chain(self.composites.keys())
            .map(String::as_str)
            .collect()
    }

    pub fn composite(&self, name: &str) -> Option<&CircuitDocument> {
        self.composites.get(name)
    }

    /// A fresh element of type `tag` with its default settings.
    pub fn create(&self, tag: &str) -> Result<Element, DocumentError> {
        self.build_element(&ElementRecord::new(tag))
    }

    /// Builds the element a record describes. An embedded `subgrid` wins over
    /// any registered type of the same name.
    pub fn build_element(&self, record: &ElementRecord) -> Result<Element, DocumentError> {
        let mut element = if let Some(subgrid) = &record.subgrid {
            Element::composite(Composite::from_document(record.kind.clone(), subgrid, self)?)
        } else if let Some(factory) = self.elements.get(&record.kind) {
            factory(record, self)?
        } else if let Some(document) = self.composites.get(&record.kind) {
            Element::composite(Composite::from_document(record.kind.clone(), document, self)?)
        } else {
            return Err(DocumentError::UnknownType(record.kind.clone()));
        };

        if let Some(name) = &record.name {
            element = element.with_name(name.clone());
        }
        if record.input_names.len() == element.num_inputs() {
            for (port, name) in record.input_names.iter().enumerate() {
                element.set_input_name(port, name.clone());
            }
        }
        if record.output_names.len() == element.num_outputs() {
            for (port, name) in record.output_names.iter().enumerate() {
                element.set_output_name(port, name.clone());
            }
        }
        if let Some(modifiers) = &record.modifiers {
            element.clear_modifiers();
            for modifier in modifiers {
                element.add_modifier(self.build_modifier(&modifier.name, &modifier.data)?);
            }
        }
        Ok(element)
    }

    pub fn build_modifier(
        &self,
        tag: &str,
        data: &Value,
    ) -> Result<Box<dyn Modifier>, DocumentError> {
        match self.modifiers.get(tag) {
            Some(factory) => factory(data),
            None => Err(DocumentError::UnknownModifier(tag.to_string())),
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;

    use serde_json::json;

    use super::Registry;
    use crate::circuit::Circuit;
    use crate::document::{CircuitDocument, ElementRecord};
    use crate::element::{Category, Element};
    use crate::error::DocumentError;
    use crate::signal::Signal::*;

    fn half_adder() -> CircuitDocument {
        serde_json::from_value(json!({
            "elements": [
                {"type": "Input", "name": "A", "position": [0, 0]},
                {"type": "Input", "name": "B", "position": [0, 4]},
                {"type": "Xor", "position": [10, 0]},
                {"type": "And", "position": [10, 6]},
                {"type": "Output", "name": "S", "position": [20, 0]},
                {"type": "Output", "name": "C", "position": [20, 6]}
            ],
            "connections": [
                {"source": [0, 0], "target": [2, 0]},
                {"source": [1, 0], "target": [2, 1]},
                {"source": [0, 0], "target": [3, 0]},
                {"source": [1, 0], "target": [3, 1]},
                {"source": [2, 0], "target": [4, 0]},
                {"source": [3, 0], "target": [5, 0]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn builtins_create_defaults() {
        let registry = Registry::with_builtins();
        let latch = registry.create("RSLatch").unwrap();
        assert_eq!(latch.input_names(), ["R", "S", "clk"]);
        assert_eq!(registry.create("SwitchingAnd").unwrap().modifiers().len(), 1);
        assert!(matches!(
            registry.create("Nand"),
            Err(DocumentError::UnknownType(tag)) if tag == "Nand"
        ));
        assert!(Registry::new().create("And").is_err());
    }

    #[test]
    fn record_overrides() {
        let registry = Registry::with_builtins();
        let mut record = ElementRecord::new("SwitchingAnd");
        record.name = Some("gate".to_string());
        record.modifiers = Some(Vec::new());
        record.output_names = vec!["out".to_string()];
        let element = registry.build_element(&record).unwrap();
        assert_eq!(element.name(), "gate");
        assert!(element.modifiers().is_empty());
        assert_eq!(element.output_names(), ["out"]);

        record.modifiers = serde_json::from_value(json!([{"name": "Wobble"}])).unwrap();
        assert!(matches!(
            registry.build_element(&record),
            Err(DocumentError::UnknownModifier(_))
        ));
        record.modifiers = serde_json::from_value(json!([{"name": "Delay", "data": {}}])).unwrap();
        assert!(matches!(
            registry.build_element(&record),
            Err(DocumentError::InvalidField { field: "data", .. })
        ));
    }

    #[test]
    fn composites_by_name() {
        let mut registry = Registry::with_builtins();
        registry.register_composite("HalfAdder", &half_adder()).unwrap();
        assert!(registry.element_names().contains(&"HalfAdder"));

        let element = registry.create("HalfAdder").unwrap();
        assert_eq!(element.category(), Category::Custom);
        assert_eq!(element.input_names(), ["A", "B"]);

        let mut circuit = Circuit::new();
        let a = circuit.add_element(Element::input(), 0, 0).unwrap();
        let b = circuit.add_element(Element::input(), 0, 4).unwrap();
        let adder = circuit.add_element(element, 10, 0).unwrap();
        let s = circuit.add_element(Element::output(), 20, 0).unwrap();
        circuit.connect(a, 0, adder, 0).unwrap();
        circuit.connect(b, 0, adder, 1).unwrap();
        circuit.connect(adder, 0, s, 0).unwrap();
        let outputs = circuit.evaluate(&[(a, High), (b, Low)]).unwrap();
        assert_eq!(outputs[&s], High);

        // The saved document embeds the sub-circuit, so it loads without the
        // composite being registered.
        let json = circuit.to_json().unwrap();
        let loaded = Circuit::from_json(&json, &Registry::with_builtins()).unwrap();
        assert_eq!(loaded.len(), 4);
    }

    #[test]
    fn load_dir_resolves_in_any_order() {
        let dir = std::env::temp_dir().join(format!("logicgrid-registry-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let full: CircuitDocument = serde_json::from_value(json!({
            "elements": [
                {"type": "Input", "name": "X", "position": [0, 0]},
                {"type": "Input", "name": "Y", "position": [0, 4]},
                {"type": "HalfAdder", "position": [10, 0]},
                {"type": "Output", "name": "S", "position": [20, 0]}
            ],
            "connections": [
                {"source": [0, 0], "target": [2, 0]},
                {"source": [1, 0], "target": [2, 1]},
                {"source": [2, 0], "target": [3, 0]}
            ]
        }))
        .unwrap();
        fs::write(dir.join("AWrapper.json"), serde_json::to_string(&full).unwrap()).unwrap();
        let half = serde_json::to_string(&half_adder()).unwrap();
        fs::write(dir.join("HalfAdder.json"), half).unwrap();
        fs::write(dir.join("broken.json"), "{").unwrap();
        fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let mut registry = Registry::with_builtins();
        let registered = registry.load_dir(&dir).unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(registered, 2);
        assert!(registry.knows("AWrapper"));
        assert_eq!(registry.create("AWrapper").unwrap().input_names(), ["X", "Y"]);
    }
}
