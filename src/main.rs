use book_catalog::app::CatalogApp;
use book_catalog::config::CatalogConfig;
use book_catalog::record_store;

fn main() -> eframe::Result<()> {
    let config = CatalogConfig::load();
    config.init_logging();
    let store = record_store::open_configured(&config);

    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder::default()
            .with_inner_size([1200.0, 720.0])
            .with_min_inner_size([640.0, 480.0])
            .with_resizable(true)
            .with_title("Buchkatalog"),
        ..Default::default()
    };

    eframe::run_native(
        "Buchkatalog",
        native_options,
        Box::new(move |_cc| Box::new(CatalogApp::new(config, store))),
    )
}
