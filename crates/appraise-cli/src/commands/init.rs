//! The `appraise init` command.

use anyhow::Result;

pub fn execute() -> Result<()> {
    // Create appraise.toml
    let config_path = std::path::Path::new("appraise.toml");
    if config_path.exists() {
        println!("appraise.toml already exists, skipping.");
    } else {
        std::fs::write(config_path, SAMPLE_CONFIG)?;
        // Round-trip through the loader so a broken starter file is
        // caught here, not on first use.
        let config = appraise_client::load_config_from(Some(config_path))?;
        println!("Created appraise.toml (service {})", config.base_url);
    }

    // Create example template
    std::fs::create_dir_all("templates")?;
    let example_path = std::path::Path::new("templates/example.json");
    if example_path.exists() {
        println!("templates/example.json already exists, skipping.");
    } else {
        std::fs::write(example_path, EXAMPLE_TEMPLATE)?;
        println!("Created templates/example.json");
    }

    println!("\nNext steps:");
    println!("  1. Edit appraise.toml with your service URL and tokens");
    println!("  2. Run: appraise validate --template templates/example.json");
    println!("  3. Run: appraise score --instance <instance.json>");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# appraise configuration

base_url = "https://rrhh.example.org"
access_token = "${APPRAISE_TOKEN}"
refresh_token = "${APPRAISE_REFRESH_TOKEN}"
timeout_secs = 30
"#;

const EXAMPLE_TEMPLATE: &str = r#"{
  "id": 1,
  "n_tipo_evaluacion": "Evaluacion Anual",
  "areas": [
    {
      "n_area": "Desempeno",
      "ponderacion": 70,
      "competencias": [
        {
          "name": "Calidad del trabajo",
          "indicadores": [
            {
              "id": 1,
              "numero": 1,
              "indicador": "Cumple los plazos comprometidos",
              "nvlindicadores": [
                { "nvl": 1, "puntaje": 1, "nombre": "Insuficiente" },
                { "nvl": 2, "puntaje": 2, "nombre": "Regular" },
                { "nvl": 3, "puntaje": 3, "nombre": "Bueno" },
                { "nvl": 4, "puntaje": 4, "nombre": "Destacado" }
              ]
            }
          ]
        }
      ]
    },
    {
      "n_area": "Observaciones",
      "ponderacion": 0,
      "competencias": []
    }
  ]
}
"#;
