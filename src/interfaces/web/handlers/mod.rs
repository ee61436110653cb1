pub(crate) mod buscar;
pub(crate) mod fuentes;
pub(crate) mod historial;
