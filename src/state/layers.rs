use super::data::Layer;

/// Handle to whatever is currently displaying layers.
///
/// The download coordinator and the loader only touch the display through
/// this trait, so the host passes it in explicitly instead of being looked up
/// globally.
pub trait LayerHost {
    /// Add a layer on top. Returns the name it was registered under.
    fn add_layer(&mut self, layer: Layer) -> String;

    /// Remove the layer called `name`, if present
    fn remove_layer(&mut self, name: &str) -> Option<Layer>;

    fn contains(&self, name: &str) -> bool;
}

/// In-memory layer list, bottom to top.
/// Layer names are unique: a duplicate gets a ` [n]` suffix.
#[derive(Debug, Default)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// The layer drawn on top
    pub fn top(&self) -> Option<&Layer> {
        self.layers.last()
    }

    pub fn get(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(Layer::name)
    }

    fn unique_name(&self, name: &str) -> String {
        if !self.contains(name) {
            return name.to_string();
        }

        (1..)
            .map(|n| format!("{} [{}]", name, n))
            .find(|candidate| !self.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

impl LayerHost for LayerStack {
    fn add_layer(&mut self, mut layer: Layer) -> String {
        let name = self.unique_name(layer.name());
        layer.meta.name = name.clone();
        self.layers.push(layer);
        name
    }

    fn remove_layer(&mut self, name: &str) -> Option<Layer> {
        let index = self.layers.iter().position(|layer| layer.name() == name)?;
        Some(self.layers.remove(index))
    }

    fn contains(&self, name: &str) -> bool {
        self.layers.iter().any(|layer| layer.name() == name)
    }
}
