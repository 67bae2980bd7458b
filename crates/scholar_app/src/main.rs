fn main() -> anyhow::Result<()> {
    scholar_app::run()
}
