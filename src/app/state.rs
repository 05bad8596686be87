use super::{ComponentState, GeoTweetsApp};
use tracing::debug;

impl GeoTweetsApp {
    pub async fn set_component_state(&self, component: &str, state: ComponentState) {
        let previous = self
            .component_states
            .lock()
            .await
            .insert(component.to_string(), state.clone());
        if previous.as_ref() != Some(&state) {
            debug!("Component '{}': {:?} -> {:?}", component, previous, state);
        }
    }

    pub async fn get_component_state(&self, component: &str) -> Option<ComponentState> {
        self.component_states.lock().await.get(component).cloned()
    }

    /// All registered components and their states, sorted by name
    pub async fn get_all_component_states(&self) -> Vec<(String, ComponentState)> {
        let mut states: Vec<_> = self
            .component_states
            .lock()
            .await
            .iter()
            .map(|(name, state)| (name.clone(), state.clone()))
            .collect();
        states.sort_by(|a, b| a.0.cmp(&b.0));
        states
    }

    /// Names of components that ended up in [`ComponentState::Failed`]
    pub async fn failed_components(&self) -> Vec<String> {
        self.get_all_component_states()
            .await
            .into_iter()
            .filter(|(_, state)| *state == ComponentState::Failed)
            .map(|(name, _)| name)
            .collect()
    }
}
