use eframe::egui;
use pathflow::gui::frontend::PathflowApp;
use pathflow::persistence::persist;
use pathflow::tree::model::DecisionTree;

fn main() -> eframe::Result {
    env_logger::init();

    let loaded_state = persist::load_active().ok().flatten();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1300.0, 710.0])
            // Provide sensible bounds so the UI stays usable on small screens
            .with_min_inner_size([700.0, 420.0])
            .with_resizable(true),
        ..Default::default()
    };
    eframe::run_native(
        "Pathflow",
        options,
        Box::new(move |_cc| {
            if let Some(state) = loaded_state {
                Ok(Box::new(PathflowApp::from_state(state)) as Box<dyn eframe::App>)
            } else {
                // No prior state: start from the built-in sample pathway
                Ok(Box::new(PathflowApp::new(DecisionTree::sample())) as Box<dyn eframe::App>)
            }
        }),
    )
}
