//! Look Dev - interactive GLB lighting tester
//!
//! A desktop harness for dialing in product-shot lighting: pick a model
//! variant, tune per-part colors, lights, materials, and background, then
//! export the settled settings as JSON for the production configurator.

mod app;
mod assets;
mod controls;
mod export;
mod model;
mod render;
mod scene;
mod settings;

fn main() {
    app::run();
}
