use book_catalog::admin_app::AdminApp;
use book_catalog::config::CatalogConfig;
use book_catalog::record_store;

fn main() -> eframe::Result<()> {
    let config = CatalogConfig::load();
    config.init_logging();
    let store = record_store::open_configured(&config);

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1000.0, 800.0])
            .with_min_inner_size([560.0, 480.0])
            .with_resizable(true)
            .with_drag_and_drop(true)
            .with_title("Buchverwaltung"),
        ..Default::default()
    };

    eframe::run_native(
        "Buchverwaltung",
        native_options,
        Box::new(move |cc| Box::new(AdminApp::new(&cc.egui_ctx, config, store))),
    )
}
