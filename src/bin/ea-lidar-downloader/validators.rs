use ea_lidar_downloader::Product;

pub fn is_product(v: &str) -> Result<Product, String> {
    v.parse::<Product>().map_err(str::to_owned)
}

pub fn is_year(v: &str) -> Result<String, String> {
    if v == "latest" || v.parse::<u16>().is_ok() {
        Ok(v.to_owned())
    } else {
        Err("must be `latest` or a year like 2022".to_owned())
    }
}
