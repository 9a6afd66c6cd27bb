use std::{collections::HashMap, fmt::Debug, sync::Arc};

use super::rdd::{RddBase, RddId};

#[derive(Clone, Default)]
pub struct Graph {
    /// All the rdd's are stored in the context in here
    rdds: HashMap<RddId, Arc<dyn RddBase>>,
}

impl Debug for Graph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Graph")
            .field("n_nodes", &self.rdds.len())
            .finish()
    }
}

impl Graph {
    pub fn store_new_rdd<R: RddBase + 'static>(&mut self, rdd: R) {
        self.rdds.insert(rdd.id(), Arc::new(rdd));
    }

    pub fn get_rdd(&self, id: RddId) -> Option<&dyn RddBase> {
        self.rdds.get(&id).map(|x| x.as_ref())
    }
}
