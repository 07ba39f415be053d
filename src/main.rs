fn main() {
    multiframe_pipeline::cli::run();
}
